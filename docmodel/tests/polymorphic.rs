use std::sync::Arc;
use bson::{Bson, doc};
use futures::TryStreamExt;
use docmodel::{memory::InMemoryStore, prelude::*};

struct People {
    person: Arc<ModelKind>,
    child: Arc<ModelKind>,
    infant: Arc<ModelKind>,
}

fn people() -> People {
    let person = ModelKind::builder("Person")
        .polymorphic("role")
        .field("role", Field::typed(FieldType::String).default_value("person"))
        .build()
        .unwrap();

    let child = ModelKind::builder("Child")
        .extends(&person)
        .field("role", Field::typed(FieldType::String).default_value("child"))
        .registered()
        .build()
        .unwrap();

    let infant = ModelKind::builder("Infant")
        .extends(&person)
        .field("age", Field::typed(FieldType::Int32).default_value(3))
        .registered_as("infant")
        .build()
        .unwrap();

    People { person, child, infant }
}

#[test]
fn variants_share_the_root_collection() {
    let People { person, child, infant } = people();

    assert_eq!(person.collection_name(), "person");
    assert_eq!(child.collection_name(), person.collection_name());
    assert_eq!(infant.collection_name(), person.collection_name());
    assert_eq!(child.child_key(), Some("role"));
}

#[test]
fn construction_dispatches_on_the_discriminator() {
    let People { person, child, infant } = people();

    let mut plain = person.prepare(doc! {}).unwrap();
    assert!(plain.is_kind(&person));
    assert_eq!(plain.get("role").unwrap(), Bson::String("person".into()));
    assert!(matches!(plain.get("age"), Err(DocumentStoreError::UnknownField(..))));

    let as_child = person.create(doc! { "role": "child" }).unwrap();
    assert!(as_child.is_kind(&child));

    let mut direct = child.prepare(doc! {}).unwrap();
    assert!(direct.is_kind(&child));
    assert_eq!(direct.get("role").unwrap(), Bson::String("child".into()));

    // an unregistered discriminator falls back to the root
    let fallback = child.create(doc! { "role": "person" }).unwrap();
    assert!(fallback.is_kind(&person));

    let mut baby = infant.prepare(doc! {}).unwrap();
    assert!(baby.is_kind(&infant));
    assert_eq!(baby.get("age").unwrap(), Bson::Int32(3));

    let dispatched = person.create(doc! { "age": 3, "role": "infant" }).unwrap();
    assert!(dispatched.is_kind(&infant));

    assert!(matches!(
        person.create(doc! { "age": 3 }),
        Err(DocumentStoreError::UnknownField(field, _)) if field == "age"
    ));
}

#[tokio::test]
async fn find_decodes_each_document_into_its_variant() {
    let store = DocumentStore::connect(InMemoryStore::builder()).await.unwrap();
    let People { person, child, infant } = people();

    person.new(&store, doc! {}).await.unwrap();
    person.new(&store, doc! { "role": "child" }).await.unwrap();
    person.new(&store, doc! { "role": "infant" }).await.unwrap();

    // queries through a variant are not narrowed to that variant
    let models = child
        .find(&store, None)
        .into_stream()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(models.len(), 3);
    assert!(models[0].is_kind(&person));
    assert!(models[1].is_kind(&child));
    assert!(models[2].is_kind(&infant));
    assert_eq!(models[2]["age"], Bson::Int32(3));

    let found = person
        .find_one(&store, doc! { "role": "infant" })
        .await
        .unwrap()
        .unwrap();

    assert!(found.is_kind(&infant));
    assert_eq!(infant.count(&store, None).await.unwrap(), 3);
}

#[test]
fn registration_rules() {
    let People { person, child, .. } = people();
    let plain = ModelKind::builder("Plain").build().unwrap();

    assert!(matches!(
        plain.register(&child),
        Err(DocumentStoreError::InvalidOperation(_))
    ));
    assert!(matches!(
        person.register(&plain),
        Err(DocumentStoreError::TypeMismatch(_))
    ));
    assert!(matches!(
        ModelKind::builder("Elsewhere").extends(&person).collection("elsewhere").build(),
        Err(DocumentStoreError::InvalidOperation(_))
    ));

    person.register_as("kid", &child).unwrap();
    assert!(person.create(doc! { "role": "kid" }).unwrap().is_kind(&child));
}
