use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use resource_dispatcher::assembler::{Assembler, RawResultSet};
use resource_dispatcher::config::ResolvedConfig;
use resource_dispatcher::lexer::Lexer;
use resource_dispatcher::parser::Parser;
use resource_dispatcher::request::compile_request;
use resource_dispatcher::select::parse_select;
use serde_json::{json, Map, Value};
use std::hint::black_box;

// 基准测试：Filter词法分析性能
fn benchmark_lexer(c: &mut Criterion) {
    let test_cases = vec![
        ("simple", "type=1"),
        ("medium", r#"status="active" AND type=1 OR priority>=3"#),
        (
            "complex",
            r#"group[isPremium=true AND active=true] AND instrument[stock OR currency].active=true OR id=1,2,3,4,5"#,
        ),
    ];

    let mut group = c.benchmark_group("lexer_performance");

    for (name, dsl) in test_cases {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &dsl, |b, &dsl| {
            b.iter(|| {
                let tokens: Vec<_> = Lexer::new(black_box(dsl)).collect();
                black_box(tokens)
            })
        });
    }

    group.finish();
}

// 基准测试：Filter语法分析性能
fn benchmark_filter_parser(c: &mut Criterion) {
    let test_cases = vec![
        ("simple", "type=1"),
        ("medium", r#"status="active" AND type=1 OR priority>=3"#),
        (
            "complex",
            r#"group[isPremium=true AND active=true] AND instrument[stock OR currency].active=true"#,
        ),
    ];

    let mut group = c.benchmark_group("filter_parser_performance");

    for (name, dsl) in test_cases {
        // 预先词法分析
        let tokens: Vec<_> = Lexer::new(dsl).collect();

        group.bench_with_input(BenchmarkId::new("parse", name), &tokens, |b, tokens| {
            b.iter(|| {
                let mut parser = Parser::new(black_box(tokens));
                match parser.parse() {
                    Ok(expr) => black_box(expr),
                    Err(_) => panic!("解析失败"),
                }
            })
        });
    }

    group.finish();
}

// 基准测试：Select语法分析性能
fn benchmark_select_parser(c: &mut Criterion) {
    let test_cases = vec![
        ("simple", "id,name"),
        ("medium", "id,name,emails[address],group.owner.id"),
        (
            "complex",
            "items(limit=10)(order=name:asc)[id,title,comments(filter=visible=true)[id,text]]",
        ),
    ];

    let mut group = c.benchmark_group("select_parser_performance");

    for (name, dsl) in test_cases {
        group.bench_with_input(BenchmarkId::new("parse", name), &dsl, |b, &dsl| {
            b.iter(|| match parse_select(black_box(dsl)) {
                Ok(tree) => black_box(tree),
                Err(_) => panic!("解析失败"),
            })
        });
    }

    group.finish();
}

// 基准测试：完整的请求编译
fn benchmark_request_compiler(c: &mut Criterion) {
    let bag = json!({
        "filter": r#"status="active" AND type=1"#,
        "order": "name:asc",
        "limit": "10",
        "page": 2,
        "select": "id,name,emails[address]",
        "client": "bench"
    });

    c.bench_function("request_compiler/full_bag", |b| {
        b.iter(|| match compile_request(black_box(&bag)) {
            Ok(request) => black_box(request),
            Err(_) => panic!("编译失败"),
        })
    });
}

// 构造基准测试用的配置与行集
fn build_assembly_fixture(user_count: usize) -> (ResolvedConfig, Vec<RawResultSet>) {
    let config = ResolvedConfig::default();

    let mut user_rows: Vec<Map<String, Value>> = Vec::with_capacity(user_count);
    let mut email_rows: Vec<Map<String, Value>> = Vec::with_capacity(user_count * 2);
    for i in 0..user_count {
        let mut row = Map::new();
        row.insert("id".to_string(), json!(i.to_string()));
        row.insert("name".to_string(), json!(format!("User {}", i)));
        user_rows.push(row);

        for j in 0..2 {
            let mut email = Map::new();
            email.insert("userId".to_string(), json!(i.to_string()));
            email.insert("address".to_string(), json!(format!("user{}-{}@example.com", i, j)));
            email_rows.push(email);
        }
    }

    let results = vec![
        RawResultSet {
            attribute_path: vec![],
            data_source_name: "primary".to_string(),
            parent_key: None,
            child_key: None,
            total_count: user_rows.len() as u64,
            rows: user_rows,
        },
        RawResultSet {
            attribute_path: vec!["emails".to_string()],
            data_source_name: "primary".to_string(),
            parent_key: Some(vec!["id".to_string()]),
            child_key: Some(vec!["userId".to_string()]),
            total_count: email_rows.len() as u64,
            rows: email_rows,
        },
    ];
    (config, results)
}

// 基准测试：结果组装（端到端）
fn benchmark_assembler(c: &mut Criterion) {
    let sizes = vec![("10_users", 10usize), ("100_users", 100usize)];

    let mut group = c.benchmark_group("assembler_performance");

    for (name, size) in sizes {
        let (config, results) = build_assembly_fixture(size);
        let assembler = Assembler::new();

        group.bench_with_input(
            BenchmarkId::new("assemble", name),
            &(config, results),
            |b, (config, results)| {
                b.iter(|| match assembler.assemble(black_box(config), black_box(results)) {
                    Ok(output) => black_box(output),
                    Err(_) => panic!("组装失败"),
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_lexer,
    benchmark_filter_parser,
    benchmark_select_parser,
    benchmark_request_compiler,
    benchmark_assembler
);
criterion_main!(benches);
