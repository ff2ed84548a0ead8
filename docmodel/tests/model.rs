use std::sync::Arc;
use bson::{Bson, doc};
use docmodel::{memory::InMemoryStore, prelude::*};

async fn store() -> DocumentStore {
    DocumentStore::connect(InMemoryStore::builder()).await.unwrap()
}

fn foo_kind() -> Arc<ModelKind> {
    let reference = ModelKind::builder("Ref").build().unwrap();

    ModelKind::builder("Foo")
        .field("bar", Field::typed(FieldType::String))
        .field("field", Field::new())
        .field("required", Field::new().required())
        .field("default", Field::new().default_value("default"))
        .field(
            "callback",
            Field::new()
                .get_callback(|_| "foo".into())
                .set_callback(|_| "bar".into()),
        )
        .field("reference", Field::reference(&reference))
        .field("_ignore_me", Field::new())
        .build()
        .unwrap()
}

#[test]
fn declared_fields_skip_private_names() {
    let foo = foo_kind();
    let names = foo.field_names();

    for name in ["bar", "field", "required", "default", "callback", "reference"] {
        assert!(names.iter().any(|declared| declared == name), "{name} missing");
    }

    assert!(!foo.has_field("_ignore_me"));
}

#[tokio::test]
async fn required_fields_block_saving() {
    let store = store().await;
    let foo = foo_kind();

    assert!(matches!(
        foo.new(&store, doc! {}).await,
        Err(DocumentStoreError::EmptyRequiredField(name)) if name == "required"
    ));
    assert_eq!(foo.count(&store, None).await.unwrap(), 0);

    let mut prepared = foo.prepare(doc! {}).unwrap();

    assert!(matches!(
        prepared.save(&store).await,
        Err(DocumentStoreError::EmptyRequiredField(_))
    ));
    assert!(matches!(
        prepared.get("required"),
        Err(DocumentStoreError::EmptyRequiredField(_))
    ));
    assert!(matches!(
        prepared.update(doc! { "foo": "bar" }),
        Err(DocumentStoreError::InvalidUpdateCall(key)) if key == "foo"
    ));
}

#[tokio::test]
async fn new_populates_defaults_and_saves() {
    let store = store().await;
    let foo = foo_kind();

    let mut model = foo.new(&store, doc! { "required": "yes" }).await.unwrap();

    assert!(model.id().is_some());
    assert_eq!(model["default"], Bson::String("default".into()));
    assert_eq!(model.get("default").unwrap(), Bson::String("default".into()));
    assert_eq!(foo.count(&store, None).await.unwrap(), 1);
}

#[tokio::test]
async fn explicit_null_survives_save_and_reload() {
    let store = store().await;
    let foo = foo_kind();

    let mut model = foo.new(&store, doc! { "required": "yes" }).await.unwrap();

    model.set("default", Bson::Null).unwrap();
    assert_eq!(model.get("default").unwrap(), Bson::Null);

    let id = model.save(&store).await.unwrap();

    let mut stored = foo
        .find_one(&store, doc! { "_id": id })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stored["default"], Bson::Null);
    assert_eq!(stored.get("default").unwrap(), Bson::Null);
}

#[tokio::test]
async fn new_instances_are_independent() {
    let store = store().await;
    let foo = foo_kind();

    let mut first = foo.new(&store, doc! { "required": "yes" }).await.unwrap();
    let mut second = foo.new(&store, doc! { "required": "yes" }).await.unwrap();

    first.set("bar", "testing").unwrap();
    second.set("bar", "whatever").unwrap();

    assert_ne!(first.get("bar").unwrap(), second.get("bar").unwrap());
    assert_ne!(first, second);
}

#[tokio::test]
async fn find_one_and_save_round_trip() {
    let store = store().await;
    let foo = foo_kind();

    let original = foo
        .new(&store, doc! { "required": "yes", "bar": "update" })
        .await
        .unwrap();

    let mut found = foo
        .find_one(&store, doc! { "bar": "update" })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, original);

    found.set("bar", "new update").unwrap();
    found.save(&store).await.unwrap();

    let mut again = foo
        .find_one(&store, doc! { "bar": "new update" })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(again, found);
    assert_eq!(again.get("bar").unwrap(), Bson::String("new update".into()));
    assert_eq!(foo.count(&store, None).await.unwrap(), 1);
    assert!(foo.find_one(&store, doc! { "bar": "update" }).await.unwrap().is_none());
}

#[tokio::test]
async fn display_shows_collection_and_identity() {
    let store = store().await;
    let foo = foo_kind();

    let mut model = foo.prepare(doc! { "required": "yes" }).unwrap();
    assert_eq!(model.to_string(), "<Model:foo id:none>");

    model.set("_id", 5).unwrap();
    assert_eq!(model.to_string(), "<Model:foo id:5>");

    let saved = foo.new(&store, doc! { "required": "yes" }).await.unwrap();
    let shown = saved.to_string();

    assert!(shown.starts_with("<Model:foo id:"));
    assert!(!shown.ends_with("id:none>"));
}

#[test]
fn closed_schema_rejects_unknown_fields() {
    let testing = ModelKind::builder("Testing").build().unwrap();

    assert!(matches!(
        testing.create(doc! { "foo": "bar" }),
        Err(DocumentStoreError::UnknownField(field, kind)) if field == "foo" && kind == "Testing"
    ));
}

#[test]
fn open_schema_creates_fields() {
    let testing = ModelKind::builder("Testing").auto_create_fields().build().unwrap();
    let mut schemaless = testing.create(doc! { "foo": "bar" }).unwrap();

    assert_eq!(schemaless["foo"], Bson::String("bar".into()));
    assert_eq!(schemaless.get("foo").unwrap(), Bson::String("bar".into()));
    assert!(schemaless.copy().contains_key("foo"));

    let field = testing.field("foo").unwrap();
    assert_eq!(testing.field_name(&field).as_deref(), Some("foo"));

    // later instances see the created field
    let mut other = testing.create(doc! {}).unwrap();
    assert_eq!(other.get("foo").unwrap(), Bson::Null);
}

#[test]
fn add_field_applies_to_new_instances() {
    let testing = ModelKind::builder("Testing").build().unwrap();

    testing
        .add_field("foo", Field::typed(FieldType::String).set_callback(|_| "bar".into()))
        .unwrap();

    let mut model = testing.create(doc! { "foo": "whatever" }).unwrap();
    assert_eq!(model["foo"], Bson::String("bar".into()));
    assert_eq!(model.get("foo").unwrap(), Bson::String("bar".into()));

    assert!(matches!(
        testing.add_field("foo", Field::new()),
        Err(DocumentStoreError::FieldAlreadyExists(..))
    ));
    assert!(matches!(
        testing.add_field("_foo", Field::new()),
        Err(DocumentStoreError::InvalidFieldName(_))
    ));
}

#[test]
fn add_field_applies_to_existing_instances() {
    let testing = ModelKind::builder("Testing").build().unwrap();
    let mut model = testing.create(doc! {}).unwrap();

    assert!(matches!(
        model.get("foo"),
        Err(DocumentStoreError::UnknownField(..))
    ));

    testing
        .add_field("foo", Field::typed(FieldType::String).default_value("fallback"))
        .unwrap();

    assert_eq!(model.get("foo").unwrap(), Bson::String("fallback".into()));

    model.set("foo", 12).unwrap();
    assert_eq!(model["foo"], Bson::String("12".into()));
}

#[tokio::test]
async fn new_hook_injects_values() {
    let store = store().await;
    let bar = ModelKind::builder("Bar")
        .field("uid", Field::typed(FieldType::String))
        .new_hook(|values| {
            values.insert("uid", "testing");
        })
        .build()
        .unwrap();

    let mut model = bar.new(&store, doc! {}).await.unwrap();
    assert_eq!(model.get("uid").unwrap(), Bson::String("testing".into()));

    let mut stored = bar.find_one(&store, None).await.unwrap().unwrap();
    assert_eq!(stored.get("uid").unwrap(), Bson::String("testing".into()));
}

#[tokio::test]
async fn delete_removes_saved_instances_only() {
    let store = store().await;
    let foo = foo_kind();

    let unsaved = foo.prepare(doc! { "required": "yes" }).unwrap();
    unsaved.delete(&store).await.unwrap();

    let saved = foo.new(&store, doc! { "required": "yes" }).await.unwrap();
    foo.new(&store, doc! { "required": "yes" }).await.unwrap();

    saved.delete(&store).await.unwrap();

    assert_eq!(foo.count(&store, None).await.unwrap(), 1);
    assert!(foo.find_one(&store, doc! { "_id": saved.id().cloned() }).await.unwrap().is_none());
}

#[tokio::test]
async fn remove_and_drop_work_on_the_collection() {
    let store = store().await;
    let foo = foo_kind();

    for bar in ["a", "a", "b"] {
        foo.new(&store, doc! { "required": "yes", "bar": bar }).await.unwrap();
    }

    assert_eq!(foo.remove(&store, doc! { "bar": "a" }).await.unwrap(), 2);
    assert_eq!(foo.count(&store, None).await.unwrap(), 1);
    assert_eq!(store.list_collections().await.unwrap(), vec!["foo".to_string()]);

    foo.drop_collection(&store).await.unwrap();

    assert_eq!(foo.count(&store, None).await.unwrap(), 0);
    assert!(store.list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn kind_level_change_sets_values() {
    let store = store().await;
    let foo = foo_kind();

    for bar in ["x", "x", "y"] {
        foo.new(&store, doc! { "required": "yes", "bar": bar }).await.unwrap();
    }

    let changed = foo
        .change(&store, doc! { "bar": "x" }, doc! { "field": "touched" })
        .await
        .unwrap();

    assert_eq!(changed, 2);
    assert_eq!(foo.count(&store, doc! { "field": "touched" }).await.unwrap(), 2);

    let replaced = foo
        .update(&store, doc! { "bar": "y" }, doc! { "$set": { "field": "single" } }, false)
        .await
        .unwrap();

    assert_eq!(replaced, 1);
}

#[tokio::test]
async fn store_options_are_validated() {
    assert!(matches!(
        DocumentStore::builder(InMemoryStore::new()).batch_size(0).build(),
        Err(DocumentStoreError::InvalidArgument(_))
    ));

    let store = DocumentStore::builder(InMemoryStore::new())
        .options(StoreOptions::default().with_batch_size(7))
        .build()
        .unwrap();

    assert_eq!(store.options().batch_size, 7);
    assert!(store.backend_as::<InMemoryStore>().is_some());

    store.shutdown().await.unwrap();
}
