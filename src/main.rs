use anyhow::Context;
use resource_dispatcher::{
    compile_request, Assembler, AssemblerOptions, RawResultSet, ResolvedConfig,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::{json, Map, Value};

/// 加载资源配置，优先使用JSON配置文件，失败时使用默认配置
fn load_config_with_fallback() -> ResolvedConfig {
    match ResolvedConfig::from_json_file("resource_config.json") {
        Ok(config) => {
            println!("✅ 成功从JSON配置文件加载资源配置");
            config
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            ResolvedConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("--- Resource Dispatcher: 请求编译器与结果组装器 ---");

    // 1. 示例请求参数包
    let bag = json!({
        "filter": r#"status="active" AND type=1"#,
        "order": "name:asc",
        "limit": "10",
        "select": "id,name,emails[address]",
        "client": "demo"
    });
    println!("\n[输入参数包]:\n{}\n", serde_json::to_string_pretty(&bag)?);

    // 2. 请求编译器 - 把参数包编译为请求描述
    println!("[步骤 1]: 编译请求参数...");
    match compile_request(&bag) {
        Ok(request) => {
            println!("✅ 成功编译请求");
            println!("请求描述: {}", serde_json::to_string_pretty(&request)?);
        }
        Err(e) => {
            println!("✗ 请求编译失败: {}", e);
        }
    }

    // 3. 加载资源配置
    println!("\n[步骤 2]: 加载资源配置...");
    let config = load_config_with_fallback();

    // 4. 结果组装器 - 把外部执行器返回的行集组装为嵌套输出
    println!("\n[步骤 3]: 组装数据源行集...");
    let results = demo_result_sets();
    println!("收到 {} 个行集", results.len());

    let assembler = Assembler::with_options(AssemblerOptions::default());
    match assembler.assemble(&config, &results) {
        Ok(output) => {
            println!("✅ 成功组装输出");
            println!("\n[输出]:\n{}", serde_json::to_string_pretty(&output)?);
        }
        Err(e) => {
            println!("✗ 组装失败: {}", e);
        }
    }

    // 5. 交互式模式：逐行输入 key=value&key=value 形式的请求
    run_repl()
}

/// 演示用的行集，模拟外部数据源执行器的返回
fn demo_result_sets() -> Vec<RawResultSet> {
    vec![
        RawResultSet {
            attribute_path: vec![],
            data_source_name: "primary".to_string(),
            parent_key: None,
            child_key: None,
            rows: rows(json!([
                {"id": "1", "name": "Alice"},
                {"id": "2", "name": "Bob"}
            ])),
            total_count: 2,
        },
        RawResultSet {
            attribute_path: vec!["emails".to_string()],
            data_source_name: "primary".to_string(),
            parent_key: Some(vec!["id".to_string()]),
            child_key: Some(vec!["userId".to_string()]),
            rows: rows(json!([
                {"userId": "1", "address": "alice@example.com"},
                {"userId": "1", "address": "work@example.com"},
                {"userId": "2", "address": "bob@example.com"}
            ])),
            total_count: 3,
        },
    ]
}

fn rows(value: Value) -> Vec<Map<String, Value>> {
    serde_json::from_value(value).expect("demo rows are well-formed")
}

/// 交互式请求编译：输入 `filter=type=1&order=name:asc` 之类的参数行，
/// 输出编译后的请求描述（值里的 '=' 不需要转义，只按第一个 '=' 拆分）
fn run_repl() -> anyhow::Result<()> {
    println!("\n--- 交互式模式 ---");
    println!("输入 key=value&key=value 形式的请求参数（exit 退出）:");

    let mut editor = DefaultEditor::new().context("无法初始化行编辑器")?;
    loop {
        match editor.readline("request> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                let _ = editor.add_history_entry(line);

                let bag = parse_query_line(line);
                match compile_request(&bag) {
                    Ok(request) => match serde_json::to_string_pretty(&request) {
                        Ok(rendered) => println!("{}", rendered),
                        Err(e) => println!("✗ 无法渲染请求描述: {}", e),
                    },
                    Err(e) => println!("✗ {}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                println!("✗ 读取输入失败: {}", e);
                break;
            }
        }
    }
    println!("再见!");
    Ok(())
}

/// 把 `key=value&key=value` 行拆成参数包，值一律当作字符串
fn parse_query_line(line: &str) -> Value {
    let mut bag = Map::new();
    for pair in line.split('&') {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key, value),
            None => (pair, ""),
        };
        bag.insert(key.trim().to_string(), Value::String(value.to_string()));
    }
    Value::Object(bag)
}
