use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hclass::{Context, ObjectModelConfig, PropertyKey, Value};

fn point_keys(ctx: &mut Context) -> (PropertyKey, PropertyKey) {
    (ctx.key("x"), ctx.key("y"))
}

fn bench_object_create(c: &mut Criterion) {
    // Every point follows the same two memoized transitions
    c.bench_function("object create 1k", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            let (x, y) = point_keys(&mut ctx);
            let proto = ctx.new_object();
            let blueprint = ctx.create_blueprint(Some(proto), 2);
            for i in 0..1000 {
                let p = Value::object(ctx.create_from_blueprint(&blueprint));
                ctx.set(p, x, Value::int(i), true).unwrap();
                ctx.set(p, y, Value::int(i * 2), true).unwrap();
            }
            black_box(ctx.heap().live_objects())
        })
    });
}

fn bench_prototype_get(c: &mut Criterion) {
    let mut ctx = Context::new();
    let (x, _) = point_keys(&mut ctx);
    let mut proto = ctx.new_object();
    ctx.set(Value::object(proto), x, Value::int(1), true).unwrap();
    for _ in 0..8 {
        proto = ctx.create_object(Some(proto));
    }
    let obj = Value::object(proto);

    c.bench_function("get through 8 prototypes", |b| {
        b.iter(|| black_box(ctx.get(black_box(obj), x).unwrap()))
    });
}

fn bench_dictionary_insert(c: &mut Criterion) {
    c.bench_function("dictionary insert 1k", |b| {
        b.iter(|| {
            let config = ObjectModelConfig::default().with_max_fast_properties(8);
            let mut ctx = Context::with_config(config).unwrap();
            let obj = Value::object(ctx.new_object());
            for i in 0..1000 {
                let key = ctx.key(&format!("k{}", i));
                ctx.set(obj, key, Value::int(i), true).unwrap();
            }
            black_box(ctx.own_property_keys(obj.to_object().unwrap()).len())
        })
    });
}

fn bench_array_fill(c: &mut Criterion) {
    c.bench_function("array fill 10k", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            let arr = Value::object(ctx.create_array(&[]));
            for i in 0..10000u32 {
                ctx.set(arr, PropertyKey::Index(i), Value::int(i as i32), true)
                    .unwrap();
            }
            black_box(arr)
        })
    });
}

fn bench_change_tracking(c: &mut Criterion) {
    c.bench_function("prototype mutation with 100 listeners", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            let (x, _) = point_keys(&mut ctx);
            let root = ctx.new_object();
            for _ in 0..100 {
                let child = ctx.create_object(Some(root));
                ctx.set(Value::object(child), x, Value::int(0), true).unwrap();
                ctx.enable_change_tracking(child);
            }
            ctx.set(Value::object(root), x, Value::int(1), true).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_object_create,
    bench_prototype_get,
    bench_dictionary_insert,
    bench_array_fill,
    bench_change_tracking,
);

criterion_main!(benches);
