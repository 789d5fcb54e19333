use criterion::{black_box, criterion_group, criterion_main, Criterion};

use binedit_core::codec::{parse, serialize, CodecOptions};
use binedit_core::defaults::{append_element, build_defaults};
use binedit_core::formats;
use binedit_core::value::Value;

/// A config tree with populated tails, closer to a real preferences file
/// than the empty defaults.
fn populated_config_bytes() -> Vec<u8> {
    let mut tree = build_defaults(formats::config_v2());
    for i in 0..16u64 {
        let hotkeys = tree.get_mut("all_hotkeys.hotkeys").unwrap();
        append_element(hotkeys);
        tree.get_mut(&format!("all_hotkeys.hotkeys[{}].method", i))
            .unwrap()
            .set_value(Value::UInt(i % 8))
            .unwrap();
    }
    for i in 0..10u64 {
        let recents = tree.get_mut("recent_tags").unwrap();
        append_element(recents);
        tree.get_mut(&format!("recent_tags[{}].path", i))
            .unwrap()
            .set_value(Value::Str(format!("/tags/archive/entry_{}.tag", i)))
            .unwrap();
    }
    for _ in 0..13 {
        let colors = tree.get_mut("appearance.colors").unwrap();
        append_element(colors);
    }
    serialize(&mut tree, &CodecOptions::default()).unwrap()
}

fn bench_parse(c: &mut Criterion) {
    let bytes = populated_config_bytes();
    let schema = formats::config_v2();
    let opts = CodecOptions::default();
    c.bench_function("parse_config", |b| {
        b.iter(|| {
            let tree = parse(black_box(&bytes), schema, &opts).unwrap();
            black_box(tree);
        });
    });
}

fn bench_serialize(c: &mut Criterion) {
    let bytes = populated_config_bytes();
    let schema = formats::config_v2();
    let opts = CodecOptions::default();
    let tree = parse(&bytes, schema, &opts).unwrap();
    c.bench_function("serialize_config", |b| {
        b.iter(|| {
            let mut tree = tree.clone();
            black_box(serialize(&mut tree, &opts).unwrap());
        });
    });
}

criterion_group!(benches, bench_parse, bench_serialize);
criterion_main!(benches);
