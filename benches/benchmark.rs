use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use linden::{parse_script, Engine, EngineConfig, MemorySink};

const SCRIPT: &str = r#"
integer total;

integer square(integer n) {
    return n * n;
}

default {
    state_entry() {
        integer i;
        list seen;
        for (i = 0; i < 2000; ++i) {
            total += square(i % 7);
            if (i % 100 == 0) seen += [i];
        }
        llSay(0, (string)total + " " + (string)llGetListLength(seen));
    }
}
"#;

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse script", |b| b.iter(|| parse_script(SCRIPT).unwrap()));
}

fn bench_run(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let script = parse_script(SCRIPT).unwrap();
    c.bench_function("run state_entry loop", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let engine = Engine::new(
                    script.clone(),
                    EngineConfig::default(),
                    Arc::new(MemorySink::new()),
                );
                engine.start().await.unwrap();
                engine.wait_for_idle(Duration::from_secs(10)).await;
                engine.stop().await.unwrap();
            })
        })
    });
}

criterion_group!(benches, bench_parse, bench_run);
criterion_main!(benches);
