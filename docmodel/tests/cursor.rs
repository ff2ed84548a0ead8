use std::sync::Arc;
use bson::{Bson, doc};
use futures::TryStreamExt;
use docmodel::{memory::InMemoryStore, prelude::*};

fn numbers() -> Arc<ModelKind> {
    ModelKind::builder("Number")
        .field("n", Field::typed(FieldType::Int32))
        .field("flag", Field::typed(FieldType::Boolean).default_value(false))
        .build()
        .unwrap()
}

/// A store that fetches two documents per round-trip, holding `5, 3, 1, 4, 2`.
async fn seeded() -> (DocumentStore, Arc<ModelKind>) {
    let store = DocumentStore::builder(InMemoryStore::new())
        .batch_size(2)
        .build()
        .unwrap();
    let number = numbers();

    for n in [5, 3, 1, 4, 2] {
        number.new(&store, doc! { "n": n }).await.unwrap();
    }

    (store, number)
}

async fn values(cursor: Cursor<'_>) -> Vec<i32> {
    cursor
        .into_stream()
        .map_ok(|model| model["n"].as_i32().unwrap_or_default())
        .try_collect()
        .await
        .unwrap()
}

#[tokio::test]
async fn iterates_across_batches() {
    let (store, number) = seeded().await;
    let mut cursor = number.find(&store, None);
    let mut seen = Vec::new();

    while let Some(model) = cursor.next().await.unwrap() {
        seen.push(model["n"].clone());
    }

    assert_eq!(seen.len(), 5);
    assert!(cursor.next().await.unwrap().is_none());
}

#[tokio::test]
async fn sorts_and_pages() {
    let (store, number) = seeded().await;

    let ascending = number.find(&store, None).sort("n", SortDirection::Asc).unwrap();
    assert_eq!(values(ascending).await, vec![1, 2, 3, 4, 5]);

    let window = number
        .find(&store, None)
        .sort("n", SortDirection::Asc)
        .unwrap()
        .skip(1)
        .unwrap()
        .limit(3)
        .unwrap();
    assert_eq!(values(window).await, vec![2, 3, 4]);

    // a zero limit is no limit
    let unlimited = number
        .find(&store, None)
        .sort("n", SortDirection::Asc)
        .unwrap()
        .limit(0)
        .unwrap();
    assert_eq!(values(unlimited).await, vec![1, 2, 3, 4, 5]);

    let filtered = number
        .find(&store, doc! { "n": { "$gte": 3 } })
        .sort("n", SortDirection::Desc)
        .unwrap();
    assert_eq!(values(filtered).await, vec![5, 4, 3]);
}

#[tokio::test]
async fn orderings_accumulate() {
    let store = DocumentStore::connect(InMemoryStore::builder()).await.unwrap();
    let pair = ModelKind::builder("Pair")
        .field("a", Field::new())
        .field("b", Field::new())
        .build()
        .unwrap();

    for (a, b) in [(1, 2), (1, 1), (0, 5)] {
        pair.new(&store, doc! { "a": a, "b": b }).await.unwrap();
    }

    let cursor = pair
        .find(&store, None)
        .order([("a", SortDirection::Asc)])
        .unwrap()
        .sort("b", SortDirection::Desc)
        .unwrap();

    assert_eq!(cursor.ordering().len(), 2);

    let pairs = cursor
        .into_stream()
        .map_ok(|model| (model["a"].clone(), model["b"].clone()))
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(
        pairs,
        vec![
            (Bson::Int32(0), Bson::Int32(5)),
            (Bson::Int32(1), Bson::Int32(2)),
            (Bson::Int32(1), Bson::Int32(1)),
        ]
    );
}

#[tokio::test]
async fn deleting_while_iterating_visits_every_document() {
    let store = DocumentStore::builder(InMemoryStore::new())
        .batch_size(2)
        .build()
        .unwrap();
    let number = numbers();

    for n in 1..=6 {
        number.new(&store, doc! { "n": n }).await.unwrap();
    }

    let mut cursor = number.find(&store, None).sort("n", SortDirection::Asc).unwrap();
    let mut seen = Vec::new();

    while let Some(model) = cursor.next().await.unwrap() {
        model.delete(&store).await.unwrap();
        seen.push(model["n"].as_i32().unwrap_or_default());
    }

    assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(number.count(&store, None).await.unwrap(), 0);
}

#[tokio::test]
async fn raw_sort_replaces_the_ordering() {
    let store = DocumentStore::connect(InMemoryStore::builder()).await.unwrap();
    let pair = ModelKind::builder("Pair")
        .field("a", Field::new())
        .field("b", Field::new())
        .build()
        .unwrap();

    for (a, b) in [(1, 2), (1, 1), (0, 5)] {
        pair.new(&store, doc! { "a": a, "b": b }).await.unwrap();
    }

    let cursor = pair
        .find(&store, None)
        .sort("a", SortDirection::Asc)
        .unwrap()
        .raw_sort(vec![Sort::new("b", SortDirection::Asc)])
        .unwrap();

    assert_eq!(cursor.ordering(), &[Sort::new("b", SortDirection::Asc)]);

    let bs = cursor
        .into_stream()
        .map_ok(|model| model["b"].clone())
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(bs, vec![Bson::Int32(1), Bson::Int32(2), Bson::Int32(5)]);

    let mut started = pair.find(&store, None);
    started.next().await.unwrap();

    assert!(matches!(
        started.raw_sort(Vec::new()),
        Err(DocumentStoreError::InvalidOperation(_))
    ));
}

#[tokio::test]
async fn ordering_errors() {
    let (store, number) = seeded().await;

    assert!(matches!(
        number.find(&store, None).order(Vec::<(String, SortDirection)>::new()),
        Err(DocumentStoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        SortDirection::try_from(2),
        Err(DocumentStoreError::TypeMismatch(_))
    ));

    let mut started = number.find(&store, None);
    started.next().await.unwrap();

    assert!(matches!(
        started.sort("n", SortDirection::Asc),
        Err(DocumentStoreError::InvalidOperation(_))
    ));
}

#[tokio::test]
async fn first_get_and_count() {
    let (store, number) = seeded().await;

    let cursor = number
        .find(&store, doc! { "n": { "$lt": 5 } })
        .sort("n", SortDirection::Desc)
        .unwrap();

    assert_eq!(cursor.first().await.unwrap().unwrap()["n"], Bson::Int32(4));
    assert_eq!(cursor.get(2).await.unwrap().unwrap()["n"], Bson::Int32(2));
    assert!(cursor.get(10).await.unwrap().is_none());

    let skipped = number.find(&store, None).skip(1).unwrap();
    assert!(skipped.get(usize::MAX).await.unwrap().is_none());

    let limited = cursor.limit(2).unwrap();

    assert!(limited.get(2).await.unwrap().is_none());
    assert_eq!(limited.count().await.unwrap(), 4);

    let empty = number.find(&store, doc! { "n": 42 });
    assert!(empty.first().await.unwrap().is_none());
    assert_eq!(empty.count().await.unwrap(), 0);
}

#[tokio::test]
async fn bulk_updates() {
    let (store, number) = seeded().await;

    assert!(matches!(
        number.find(&store, None).update(doc! { "$set": { "flag": true } }).await,
        Err(DocumentStoreError::InvalidArgument(_))
    ));

    let changed = number
        .find(&store, doc! { "n": { "$gt": 3 } })
        .change(doc! { "flag": true })
        .await
        .unwrap();

    assert_eq!(changed, 2);
    assert_eq!(number.count(&store, doc! { "flag": true }).await.unwrap(), 2);

    let bumped = number
        .find(&store, doc! {})
        .update(doc! { "$inc": { "n": 10 } })
        .await
        .unwrap();

    assert_eq!(bumped, 5);
    assert_eq!(number.count(&store, doc! { "n": { "$gt": 10 } }).await.unwrap(), 5);
}
