use criterion::{criterion_group, criterion_main, Criterion};
use questline_core::{
    InMemoryAgentState, Ingredient, IngredientEntry, ItemStack, ResourceId, TaskEntry,
};
use serde_json::json;
use std::hint::black_box;

fn full_inventory(item: &ResourceId) -> InMemoryAgentState {
    let mut state = InMemoryAgentState::new();
    let dirt: ResourceId = "minecraft:dirt".parse().expect("valid id");
    for slot in 0..36 {
        let stack = if slot % 3 == 0 {
            ItemStack::new(item.clone(), 16)
        } else {
            ItemStack::new(dirt.clone(), 64)
        };
        state.inventory.push(stack);
    }
    state
}

fn bench_ingredient_submit(c: &mut Criterion) {
    let ore: ResourceId = "minecraft:iron_ore".parse().expect("valid id");
    let entry = TaskEntry::Ingredient(IngredientEntry::new(Ingredient::of_item(ore.clone()), 100, None));
    let template = full_inventory(&ore);

    c.bench_function("entry/ingredient_submit_full_inventory", |b| {
        b.iter(|| {
            let mut state = template.clone();
            black_box(entry.submit(&mut state));
        });
    });
}

fn bench_entry_decode(c: &mut Criterion) {
    let doc = json!({
        "type": "questline:ingredient",
        "ingredient": [{"item": "minecraft:iron_ore"}, {"tag": "forge:ores"}],
        "amount": 5,
        "description": "Bring ore"
    });

    c.bench_function("entry/decode_ingredient", |b| {
        b.iter(|| black_box(TaskEntry::from_document(black_box(&doc)).expect("decode")));
    });
}

criterion_group!(benches, bench_ingredient_submit, bench_entry_decode);
criterion_main!(benches);
