mod common;

use common::{NoteScheme, PersonScheme, PostScheme, SlowBackend, UserScheme, create_person};
use docmodel::{memory::InMemoryStore, prelude::*};
use std::time::Duration;

#[tokio::test]
async fn create_find_update_delete() {
    let people = Model::<PersonScheme, _>::new(InMemoryStore::new());

    let alice = create_person(&people, "Alice").await;
    assert_eq!(alice.name, "Alice");
    assert_ne!(alice.id, ObjectId::default());

    let found = people.find(alice.id).one().await.unwrap();
    assert_eq!(found, alice);

    let bob = people
        .update(alice.id, doc! { "name": "Bob" })
        .await
        .unwrap();
    assert_eq!(bob.id, alice.id);
    assert_eq!(bob.name, "Bob");

    assert!(people.delete(alice.id).await.unwrap());
    assert!(
        people
            .find(alice.id)
            .one()
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(people.find_all().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn created_identifiers_are_unique() {
    let people = Model::<PersonScheme, _>::new(InMemoryStore::new());

    let first = create_person(&people, "Alice").await;
    let second = create_person(&people, "Alice").await;

    assert_ne!(first.id, second.id);
    assert_eq!(people.find(doc! { "name": "Alice" }).all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn create_replaces_caller_supplied_identifier() {
    let people = Model::<PersonScheme, _>::new(InMemoryStore::new());
    let supplied = ObjectId::new();

    let created = people
        .create_fields(doc! { "_id": supplied, "name": "Alice" })
        .await
        .unwrap();

    assert_ne!(created.id, supplied);
}

#[tokio::test]
async fn create_from_record_assigns_identifier() {
    let users = Model::<UserScheme, _>::new(InMemoryStore::new());

    let created = users
        .create_record(UserScheme {
            name: "Alice".into(),
            password: "s3cret".into(),
            ..UserScheme::default()
        })
        .await
        .unwrap();

    assert_ne!(created.id, ObjectId::default());
    assert_eq!(created.password, "s3cret");
    assert_eq!(users.find(created.id).one().await.unwrap(), created);
}

#[tokio::test]
async fn update_is_idempotent() {
    let people = Model::<PersonScheme, _>::new(InMemoryStore::new());
    let alice = create_person(&people, "Alice").await;

    let once = people.update(alice.id, doc! { "name": "Bob" }).await.unwrap();
    let twice = people.update(alice.id, doc! { "name": "Bob" }).await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(people.find_all().all().await.unwrap(), vec![twice]);
}

#[tokio::test]
async fn update_modifies_first_match_only() {
    let people = Model::<PersonScheme, _>::new(InMemoryStore::new());
    let first = create_person(&people, "Alice").await;
    create_person(&people, "Alice").await;

    let updated = people
        .update(doc! { "name": "Alice" }, doc! { "name": "Carol" })
        .await
        .unwrap();

    assert_eq!(updated.id, first.id);
    assert_eq!(people.find(doc! { "name": "Alice" }).all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let people = Model::<PersonScheme, _>::new(InMemoryStore::new());
    let notes = Model::<NoteScheme, _>::new(InMemoryStore::new());
    let alice = create_person(&people, "Alice").await;

    assert!(matches!(
        people.create(Payload::Empty).await,
        Err(DocumentStoreError::Validation(_))
    ));
    assert!(matches!(
        people.create(Payload::from(None::<Document>)).await,
        Err(DocumentStoreError::Validation(_))
    ));
    assert!(matches!(
        notes.create_record(NoteScheme { text: "hi".into() }).await,
        Err(DocumentStoreError::Validation(_))
    ));
    assert!(matches!(
        people.update(alice.id, doc! {}).await,
        Err(DocumentStoreError::Validation(_))
    ));
    assert!(matches!(
        people.update(alice.id, doc! { "_id": ObjectId::new() }).await,
        Err(DocumentStoreError::Validation(_))
    ));
    assert_eq!(people.find(alice.id).one().await.unwrap(), alice);
}

#[tokio::test]
async fn update_without_match_is_not_found() {
    let people = Model::<PersonScheme, _>::new(InMemoryStore::new());

    let result = people.update(ObjectId::new(), doc! { "name": "Bob" }).await;

    assert!(result.unwrap_err().is_not_found());
}

#[tokio::test]
async fn delete_without_match_succeeds() {
    let people = Model::<PersonScheme, _>::new(InMemoryStore::new());
    create_person(&people, "Alice").await;

    assert!(people.delete(ObjectId::new()).await.unwrap());
    assert_eq!(people.delete_count(doc! { "name": "Bob" }).await.unwrap(), 0);
    assert_eq!(people.delete_count(Selector::All).await.unwrap(), 1);
}

#[tokio::test]
async fn delete_accepts_every_selector_shape() {
    let people = Model::<PersonScheme, _>::new(InMemoryStore::new());
    let a = create_person(&people, "A").await;
    let b = create_person(&people, "B").await;
    let c = create_person(&people, "C").await;

    assert_eq!(people.delete_count(a.id.to_hex()).await.unwrap(), 1);
    assert_eq!(people.delete_count(vec![b.id, c.id]).await.unwrap(), 2);
    assert!(people.find_all().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn collection_name_can_be_overridden() {
    let store = InMemoryStore::new();
    let people = Model::<PersonScheme, _>::builder(store.clone())
        .collection("People")
        .build();

    create_person_in(&people).await;

    assert_eq!(people.collection(), "People");
    assert_eq!(store.count("People").await, 1);
    assert_eq!(store.count("Persons").await, 0);
}

async fn create_person_in(model: &Model<PersonScheme, InMemoryStore>) {
    model.create_fields(doc! { "name": "Alice" }).await.unwrap();
}

#[test]
fn default_collection_follows_scheme_name() {
    let users = Model::<UserScheme, _>::new(InMemoryStore::new());

    assert_eq!(users.collection(), "Users");
    assert_eq!(UserScheme::collection_name(), "Users");
    assert_eq!(PersonScheme::scheme_name(), "PersonScheme");
}

#[tokio::test]
async fn slow_store_calls_time_out() {
    let backend = SlowBackend {
        inner: InMemoryStore::new(),
        delay: Duration::from_millis(200),
    };
    let people = Model::<PersonScheme, _>::builder(backend)
        .timeout(Duration::from_millis(10))
        .build();

    assert!(matches!(
        people.find_all().all().await,
        Err(DocumentStoreError::Timeout(_, _))
    ));
    assert!(matches!(
        people.create_fields(doc! { "name": "Alice" }).await,
        Err(DocumentStoreError::Timeout(_, _))
    ));
}

#[tokio::test]
async fn models_share_a_backend_by_reference() {
    let store = InMemoryStore::new();
    let writer = Model::<PersonScheme, _>::new(&store);
    let reader = Model::<PersonScheme, _>::new(&store);

    let alice = writer.create_fields(doc! { "name": "Alice" }).await.unwrap();

    assert_eq!(reader.find(alice.id).one().await.unwrap(), alice);
}

#[tokio::test]
async fn resolved_references_are_stored_as_identifiers() {
    let store = InMemoryStore::new();
    let users = Model::<UserScheme, _>::new(store.clone());
    let posts = Model::<PostScheme, _>::new(store);

    let alice = users
        .create_fields(doc! { "name": "Alice", "password": "s3cret" })
        .await
        .unwrap();
    let mut post = posts
        .create_fields(doc! { "title": "one", "author": alice.id })
        .await
        .unwrap();
    posts.expand([&mut post], "writer").await;
    assert!(post.author.is_resolved());

    let copy = posts.create_record(post.clone()).await.unwrap();
    let stored = posts.find(copy.id).documents().await.unwrap();

    assert_eq!(stored[0].get("author"), Some(&Bson::ObjectId(alice.id)));
    assert!(!copy.author.is_resolved());
    assert_eq!(copy.author.id(), Some(alice.id));
}
