use bson::{doc, Bson, Document};
use itertools::Itertools;

use renoir_mongo::mongo::DocumentCursor;
use renoir_mongo::{
    ContextConfig, ContextError, DocumentStore, KeyRange, KeySplit, MemoryStore, MongoContext,
    MongoError, StoreError, StreamContext,
};
use utils::TestHelper;

mod utils;

fn keys(documents: &[Document]) -> Vec<Bson> {
    documents
        .iter()
        .map(|d| d.get("a").cloned().unwrap())
        .collect()
}

#[test]
fn parallelize_seeded_collection() {
    let store = MemoryStore::new("test.test");
    store.insert_many([doc! { "a": 1 }, doc! { "a": 2 }, doc! { "a": 3 }]);
    TestHelper::local_mongo(store, |ctx| {
        let documents = ctx.parallelize(1, 3, "a").unwrap().collect().unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(keys(&documents), vec![Bson::Int32(1), Bson::Int32(2), Bson::Int32(3)]);
    });
}

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new("test.test");
    store.insert_many([doc! { "a": 1 }, doc! { "a": 2 }, doc! { "a": 3 }]);
    store
}

#[test]
fn every_construction_reads_the_seeded_documents() {
    let conf = || ContextConfig::new().master("local").app_name("testApp");
    let builder = || MongoContext::builder(TestHelper::uri()).store(seeded_store());
    let contexts = [
        builder().config(conf()),
        builder().context(StreamContext::new(conf()).unwrap()),
        builder().master("local").app_name("testApp"),
        builder()
            .config(ContextConfig::new().master("local[4]").app_name("other"))
            .master("local")
            .app_name("testApp"),
        builder()
            .master("local")
            .app_name("testApp")
            .home("path/to/home")
            .jar("test.jar"),
        builder()
            .master("local")
            .app_name("testApp")
            .home("path/to/home")
            .jars(["test.jar"]),
    ];
    for (path, builder) in contexts.into_iter().enumerate() {
        let ctx = builder.build().unwrap();
        assert_eq!(ctx.master(), "local", "path {path}");
        assert_eq!(ctx.app_name(), "testApp", "path {path}");
        let documents = ctx.parallelize(1, 3, "a").unwrap().collect().unwrap();
        assert_eq!(keys(&documents), vec![Bson::Int32(1), Bson::Int32(2), Bson::Int32(3)]);
        ctx.stop();
        assert!(ctx.context().is_stopped(), "path {path}");
    }
}

#[test]
fn nested_and_array_keys() {
    let store = MemoryStore::new("nested");
    store.insert_many([
        doc! { "a": { "b": 2 }, "i": 0 },
        doc! { "a": [2, "x"], "i": 1 },
        doc! { "a": [{ "b": 1 }, { "b": "x" }], "i": 2 },
        doc! { "a": { "b": "2" }, "i": 3 },
    ]);
    TestHelper::local_mongo(store, |ctx| {
        let documents = ctx.parallelize(1, 3, "a.b").unwrap().collect().unwrap();
        let order = documents
            .iter()
            .map(|d| d.get_i32("i").unwrap())
            .collect_vec();
        assert_eq!(order, vec![2, 0]);
        assert_eq!(ctx.parallelize(1, 3, "a").unwrap().count().unwrap(), 1);
    });
}

struct PanickingStore;

impl DocumentStore for PanickingStore {
    fn find_range(
        &self,
        _key: &str,
        _split: &KeySplit,
        _batch_size: u32,
    ) -> Result<DocumentCursor, StoreError> {
        panic!("store crashed");
    }

    fn describe(&self) -> String {
        "panicking".to_string()
    }
}

#[test]
fn crashed_read_does_not_affect_other_reads() {
    let sc = StreamContext::new(ContextConfig::new().master("local[2]").app_name("testApp"))
        .unwrap();
    let healthy = MongoContext::builder(TestHelper::uri())
        .context(sc.clone())
        .store(seeded_store())
        .build()
        .unwrap();
    let broken = MongoContext::builder(TestHelper::uri())
        .context(sc.clone())
        .store(PanickingStore)
        .build()
        .unwrap();

    let handles = (0..8)
        .map(|t| {
            let healthy = healthy.clone();
            let broken = broken.clone();
            std::thread::spawn(move || {
                if t % 2 == 0 {
                    healthy.parallelize(1, 3, "a").unwrap().count()
                } else {
                    broken.parallelize(1, 3, "a").unwrap().count()
                }
            })
        })
        .collect_vec();
    for (t, handle) in handles.into_iter().enumerate() {
        let res = handle.join().unwrap();
        if t % 2 == 0 {
            assert_eq!(res.unwrap(), 3);
        } else {
            assert!(matches!(
                res,
                Err(MongoError::Context(ContextError::WorkerPanicked(_)))
            ));
        }
    }
    sc.stop();
}

#[test]
fn only_numeric_keys_in_range_are_read() {
    let store = MemoryStore::new("mixed");
    store.insert_many((-20..40).map(|i| doc! { "a": i, "i": i }));
    store.insert_many([
        doc! { "a": "5" },
        doc! { "b": 5 },
        doc! { "a": Bson::Null },
        doc! { "a": 7.5 },
        doc! { "a": 100i64 },
        doc! { "a": f64::NAN },
    ]);
    TestHelper::local_mongo(store, |ctx| {
        let documents = ctx.parallelize(0, 9, "a").unwrap().collect().unwrap();
        let mut expected = (0..10).map(Bson::Int32).collect_vec();
        expected.insert(8, Bson::Double(7.5));
        assert_eq!(keys(&documents), expected);

        let handle = ctx.parallelize(-20, 100, "a").unwrap();
        assert_eq!(handle.count().unwrap(), 62);
    });
}

#[test]
fn count_matches_collect() {
    let store = MemoryStore::new("count");
    store.insert_many((0..1000).map(|i| doc! { "a": (i * 7919) % 1000 }));
    TestHelper::local_mongo(store, |ctx| {
        for (lower, upper) in [(0, 999), (10, 10), (500, 1500), (-5, 3), (3, -5)] {
            let handle = ctx.parallelize(lower, upper, "a").unwrap();
            let range = KeyRange::new(lower, upper);
            let expected = (0..1000).filter(|&k| lower <= k && k <= upper).count();
            assert_eq!(handle.count().unwrap(), expected, "range {range}");

            let documents = handle.collect().unwrap();
            assert_eq!(documents.len(), expected, "range {range}");
            let sorted = keys(&documents)
                .iter()
                .map(|k| k.as_i32().unwrap())
                .tuple_windows()
                .all(|(a, b)| a <= b);
            assert!(sorted, "range {range}");
        }
    });
}

#[test]
fn extreme_bounds() {
    let store = MemoryStore::new("extreme");
    store.insert_many([
        doc! { "a": i64::MIN },
        doc! { "a": 0 },
        doc! { "a": i64::MAX },
    ]);
    TestHelper::local_mongo(store, |ctx| {
        let handle = ctx.parallelize(i64::MIN, i64::MAX, "a").unwrap();
        assert_eq!(handle.count().unwrap(), 3);
        assert_eq!(ctx.parallelize(i64::MAX, i64::MAX, "a").unwrap().count().unwrap(), 1);
    });
}

#[test]
fn wrap_an_existing_context() {
    TestHelper::local_ctx(|sc| {
        let store = MemoryStore::new("shared");
        store.insert_many((0..50).map(|i| doc! { "a": i }));

        let ctx = MongoContext::builder(TestHelper::uri())
            .context(sc.clone())
            .store(store)
            .build()
            .unwrap();
        assert!(ctx.context().same_session(&sc));
        assert_eq!(ctx.parallelize(10, 19, "a").unwrap().count().unwrap(), 10);

        let res = ctx
            .parallelize(0, 49, "a")
            .unwrap()
            .stream()
            .map(|d| d.get_i32("a").unwrap())
            .filter(|a| a % 10 == 0)
            .collect_vec();
        sc.execute_blocking().unwrap();
        assert_eq!(res.get().unwrap(), vec![0, 10, 20, 30, 40]);
    });
}

#[test]
fn contexts_are_independent() {
    let store = MemoryStore::new("test.test");
    store.insert_many([doc! { "a": 1 }, doc! { "a": 2 }, doc! { "a": 3 }]);
    let config = ContextConfig::new().master("local[2]").app_name("testApp");
    let first = MongoContext::builder(TestHelper::uri())
        .config(config.clone())
        .store(store.clone())
        .build()
        .unwrap();
    let second = MongoContext::builder(TestHelper::uri())
        .config(config)
        .store(store)
        .build()
        .unwrap();

    first.stop();
    assert!(first.parallelize(1, 3, "a").unwrap_err().is_stopped());
    assert_eq!(second.parallelize(1, 3, "a").unwrap().collect().unwrap().len(), 3);
    second.stop();
}

#[test]
fn concurrent_collects_on_one_context() {
    let store = MemoryStore::new("concurrent");
    store.insert_many((0..200).map(|i| doc! { "a": i }));
    let ctx = MongoContext::builder(TestHelper::uri())
        .master("local[4]")
        .app_name("testApp")
        .store(store)
        .build()
        .unwrap();

    let handles = (0..8)
        .map(|t| {
            let ctx = ctx.clone();
            std::thread::spawn(move || {
                let lower = t * 25;
                ctx.parallelize(lower, lower + 24, "a")
                    .unwrap()
                    .collect()
                    .unwrap()
            })
        })
        .collect_vec();
    for (t, handle) in handles.into_iter().enumerate() {
        let documents = handle.join().unwrap();
        let expected = (t as i32 * 25..t as i32 * 25 + 25).map(Bson::Int32).collect_vec();
        assert_eq!(keys(&documents), expected);
    }
    ctx.stop();
}

#[test]
fn context_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let content = "master = \"local[3]\"\napp_name = \"testApp\"\n";
    std::io::Write::write_all(&mut file, content.as_bytes()).unwrap();
    let config = ContextConfig::from_file(file.path()).unwrap();
    let sc = StreamContext::new(config).unwrap();
    assert_eq!(sc.master(), "local[3]");
    assert_eq!(sc.app_name(), "testApp");
    assert_eq!(sc.parallelism(), 3);
    sc.stop();
}
