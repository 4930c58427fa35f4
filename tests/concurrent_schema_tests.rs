/// Concurrent schema access tests
///
/// First-use races and interleaved mutations against one schema key
/// Run with: cargo test --test concurrent_schema_tests

mod common;

use common::{Fixture, Ticket};
use dynmodel::{BaseRecord, FieldSpec, FieldType, SchemaKey, SchemaStore};
use std::sync::Arc;
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_lookup_creates_one_schema() {
    let fx = Arc::new(Fixture::new());
    let key = SchemaKey::new(Ticket::base_type(), "bug");
    let num_tasks = 16;
    let barrier = Arc::new(Barrier::new(num_tasks));

    let mut handles = vec![];
    for _ in 0..num_tasks {
        let fx = Arc::clone(&fx);
        let key = key.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            fx.registry.get_or_create(&key).await.unwrap().id
        }));
    }

    let ids: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|handle| handle.unwrap())
        .collect();

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(fx.store.schema_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_lookup_of_untyped_key() {
    let fx = Arc::new(Fixture::new());
    let key = SchemaKey::untyped(Ticket::base_type());
    let barrier = Arc::new(Barrier::new(2));

    let mut handles = vec![];
    for _ in 0..2 {
        let fx = Arc::clone(&fx);
        let key = key.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            fx.registry.get_or_create(&key).await.unwrap().id
        }));
    }

    let mut ids = vec![];
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    assert_eq!(ids[0], ids[1]);
    assert_eq!(fx.store.schema_count().await, 1);
    assert_eq!(fx.store.list_schemas(Ticket::base_type()).await.unwrap()[0].key, key);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_store_level_create_race_is_tolerated() {
    let fx = Arc::new(Fixture::new());
    let key = SchemaKey::new(Ticket::base_type(), "feature");
    let num_tasks = 8;
    let barrier = Arc::new(Barrier::new(num_tasks));

    let mut handles = vec![];
    for _ in 0..num_tasks {
        let fx = Arc::clone(&fx);
        let key = key.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            fx.store.get_or_create_schema(&key).await.unwrap()
        }));
    }

    let mut created = 0;
    for handle in handles {
        let (_, was_created) = handle.await.unwrap();
        if was_created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(fx.store.schema_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_field_adds_all_land_in_cache() {
    let fx = Arc::new(Fixture::new());
    let key = SchemaKey::new(Ticket::base_type(), "bug");
    let num_tasks = 10;
    let barrier = Arc::new(Barrier::new(num_tasks));

    let mut handles = vec![];
    for task_id in 0..num_tasks {
        let fx = Arc::clone(&fx);
        let key = key.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            fx.registry
                .add_field(&key, FieldSpec::new(format!("field_{}", task_id), FieldType::Char))
                .await
                .unwrap();
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let cached = fx.registry.cache().peek(&key).unwrap().unwrap();
    assert_eq!(cached.len(), num_tasks);
    assert_eq!(fx.store.schema_count().await, 1);
}
