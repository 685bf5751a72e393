mod common;

use common::{CountingBackend, PostScheme, UserScheme};
use docmodel::{memory::InMemoryStore, prelude::*};
use std::sync::Arc;

struct Fixture {
    users: Model<UserScheme, Arc<CountingBackend>>,
    posts: Model<PostScheme, Arc<CountingBackend>>,
    backend: Arc<CountingBackend>,
}

fn fixture() -> Fixture {
    let backend = Arc::new(CountingBackend::default());

    Fixture {
        users: Model::new(backend.clone()),
        posts: Model::new(backend.clone()),
        backend,
    }
}

async fn user(fixture: &Fixture, name: &str) -> UserScheme {
    fixture
        .users
        .create_fields(doc! { "name": name, "password": "s3cret" })
        .await
        .unwrap()
}

async fn post(fixture: &Fixture, title: &str, author: ObjectId) -> PostScheme {
    fixture
        .posts
        .create_fields(doc! { "title": title, "author": author })
        .await
        .unwrap()
}

#[tokio::test]
async fn expands_every_element() {
    let fixture = fixture();
    let alice = user(&fixture, "Alice").await;
    let bob = user(&fixture, "Bob").await;
    post(&fixture, "one", alice.id).await;
    post(&fixture, "two", bob.id).await;
    post(&fixture, "three", alice.id).await;

    let mut posts = fixture.posts.find_all().all().await.unwrap();
    let report = fixture.posts.expand(posts.iter_mut(), "writer").await;

    assert!(report.is_complete());
    assert_eq!(report.resolved, 3);
    let authors = posts
        .iter()
        .map(|post| post.author.resolved().map(|author| author.name.clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        authors,
        [Some("Alice".to_string()), Some("Bob".to_string()), Some("Alice".to_string())],
    );
}

#[tokio::test]
async fn repeated_identifiers_are_fetched_once() {
    let fixture = fixture();
    let alice = user(&fixture, "Alice").await;
    post(&fixture, "one", alice.id).await;
    post(&fixture, "two", alice.id).await;

    let mut posts = fixture.posts.find_all().all().await.unwrap();
    let before = fixture.backend.finds();
    fixture.posts.expand(posts.iter_mut(), "writer").await;

    assert_eq!(fixture.backend.finds() - before, 1);
}

#[tokio::test]
async fn failures_are_isolated_per_element() {
    let fixture = fixture();
    let alice = user(&fixture, "Alice").await;
    post(&fixture, "one", alice.id).await;
    post(&fixture, "dangling", ObjectId::new()).await;
    post(&fixture, "three", alice.id).await;

    let mut posts = fixture.posts.find_all().all().await.unwrap();
    let report = fixture.posts.expand(posts.iter_mut(), "writer").await;

    assert_eq!(report.resolved, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert!(report.failures[0].error.is_not_found());
    assert!(posts[0].author.is_resolved());
    assert!(!posts[1].author.is_resolved());
    assert!(posts[2].author.is_resolved());
}

#[tokio::test]
async fn expands_a_single_document() {
    let fixture = fixture();
    let alice = user(&fixture, "Alice").await;
    let mut post = post(&fixture, "one", alice.id).await;

    let report = fixture.posts.expand([&mut post], "writer").await;

    assert_eq!(report.resolved, 1);
    assert_eq!(post.author.resolved(), Some(&alice));
    assert_eq!(post.author.id(), Some(alice.id));
}

#[tokio::test]
async fn resolved_references_are_skipped() {
    let fixture = fixture();
    let alice = user(&fixture, "Alice").await;
    let mut post = post(&fixture, "one", alice.id).await;
    fixture.posts.expand([&mut post], "writer").await;

    let report = fixture.posts.expand([&mut post], "writer").await;

    assert_eq!(report.resolved, 0);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn unusable_fields_are_expansion_errors() {
    let fixture = fixture();
    let alice = user(&fixture, "Alice").await;
    let mut post = post(&fixture, "one", alice.id).await;

    // Expansion goes by output name, so the declared name is unknown.
    for field in ["missing", "title", "author", "reviewers"] {
        let report = fixture.posts.expand([&mut post], field).await;

        assert_eq!(report.failures.len(), 1, "{field}");
        assert!(
            matches!(report.failures[0].error, DocumentStoreError::Expansion(..)),
            "{field}",
        );
    }
    assert!(!post.author.is_resolved());
}

#[tokio::test]
async fn related_documents_come_from_the_target_collection() {
    let store = InMemoryStore::new();
    let users = Model::<UserScheme, _>::new(store.clone());
    let posts = Model::<PostScheme, _>::builder(store.clone())
        .collection("Articles")
        .build();

    let alice = users.create_fields(doc! { "name": "Alice" }).await.unwrap();
    posts
        .create_fields(doc! { "title": "one", "author": alice.id })
        .await
        .unwrap();

    let mut found = posts.find_all().all().await.unwrap();
    let report = posts.expand(found.iter_mut(), "writer").await;

    assert!(report.is_complete());
    assert_eq!(found[0].author.resolved().map(|author| author.name.as_str()), Some("Alice"));
}
