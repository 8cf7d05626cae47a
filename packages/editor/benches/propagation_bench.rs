use composer_editor::{Document, NodeDef, NodeId};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

/// A card template with `instances` linked copies
fn cards(instances: usize) -> (Document, NodeId) {
    let mut doc = Document::default();
    let card = doc.create(
        &NodeDef::new("div").with_class("card").with_children([
            NodeDef::text("h2", "Title"),
            NodeDef::text("p", "Description"),
            NodeDef::text("button", "Buy"),
        ]),
    );
    for _ in 0..instances {
        doc.create_symbol(&card).unwrap();
    }
    (doc, card)
}

fn style_fan_out(c: &mut Criterion) {
    let (mut doc, card) = cards(100);

    c.bench_function("style_fan_out_100_instances", |b| {
        b.iter(|| doc.set_style(black_box(&card), [("color", "red")]))
    });
}

fn insert_fan_out(c: &mut Criterion) {
    c.bench_function("insert_fan_out_100_instances", |b| {
        b.iter_batched(
            || cards(100),
            |(mut doc, card)| doc.append_def(black_box(&NodeDef::text("span", "New")), &card, Some(0)),
            BatchSize::LargeInput,
        )
    });
}

fn create_symbol(c: &mut Criterion) {
    c.bench_function("create_symbol_nested", |b| {
        b.iter_batched(
            || {
                let (mut doc, card) = cards(10);
                let page = doc.create(&NodeDef::new("main"));
                doc.create_symbol_in(&card, Some(&page), None).unwrap();
                (doc, page)
            },
            |(mut doc, page)| doc.create_symbol(black_box(&page)),
            BatchSize::LargeInput,
        )
    });
}

fn export_import(c: &mut Criterion) {
    let (doc, _) = cards(200);
    let json = doc.to_json().unwrap();

    c.bench_function("import_200_instances", |b| {
        b.iter(|| Document::from_json(black_box(&json), Default::default()))
    });
}

criterion_group!(
    benches,
    style_fan_out,
    insert_fan_out,
    create_symbol,
    export_import
);
criterion_main!(benches);
