mod common;

use common::{BlogPost, User, post, table, user};
use single_table::{Error, MemoryStore, Registry, Table, Value};

fn names(users: &[User]) -> Vec<&str> {
    let mut names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
    names.sort();
    names
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let table = table();
    let alice = User {
        name: "alice".to_string(),
        email: Some("alice@example.com".to_string()),
        age: Some(31),
        description: Some("writes things".to_string()),
    };

    let item = table.item(&alice).create().await.unwrap();
    assert_eq!(item.primary_key, "user#alice");
    assert_eq!(item.index_keys.len(), 2);

    let stored = table.model::<User>().get(&item.primary_key).await.unwrap();
    assert_eq!(stored, Some(alice.clone()));
    assert_eq!(table.model::<User>().find("alice").await.unwrap(), Some(alice));
}

#[tokio::test]
async fn second_create_with_same_key_fails() {
    let table = table();
    table.item(&user("test", 20)).create().await.unwrap();

    let err = table.item(&user("test", 99)).create().await.unwrap_err();
    assert!(matches!(err, Error::DuplicateKey(ref key) if key == "user#test"));

    let stored = table.model::<User>().find("test").await.unwrap().unwrap();
    assert_eq!(stored.age, Some(20));
}

#[tokio::test]
async fn empty_unique_key_is_rejected_before_writing() {
    let table = table();
    let err = table.item(&user("", 20)).create().await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let err = table.item(&user("", 20)).update().await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(table.store().is_empty().unwrap());
}

#[tokio::test]
async fn search_returns_exactly_the_matching_items() {
    let table = table();
    let mut a = user("a", 20);
    a.email = Some("shared@example.com".to_string());
    let mut c = user("c", 30);
    c.email = Some("shared@example.com".to_string());
    for u in [&a, &user("b", 20), &c] {
        table.item(u).create().await.unwrap();
    }
    let users = table.model::<User>();

    let twenty = users.search(User::AGE.eq(20)).all().await.unwrap();
    assert_eq!(names(&twenty), vec!["a", "b"]);

    let shared = users
        .search(User::EMAIL.eq("shared@example.com"))
        .all()
        .await
        .unwrap();
    assert_eq!(names(&shared), vec!["a", "c"]);

    assert!(users.search(User::AGE.eq(40)).all().await.unwrap().is_empty());
    assert_eq!(users.search(User::AGE.eq(30)).count().await.unwrap(), 1);
}

#[tokio::test]
async fn search_keys_are_scoped_to_their_model() {
    let table = table();
    table.item(&user("test", 20)).create().await.unwrap();
    table.item(&post("test", "test")).create().await.unwrap();

    let users = table
        .model::<User>()
        .search(User::NAME.eq("test"))
        .all()
        .await
        .unwrap();
    assert_eq!(users.len(), 1);

    let posts = table
        .model::<BlogPost>()
        .search(BlogPost::TITLE.eq("test"))
        .all()
        .await
        .unwrap();
    assert_eq!(posts, vec![post("test", "test")]);

    assert!(
        table
            .model::<BlogPost>()
            .get("user#test")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn range_and_prefix_search() {
    let table = table();
    for (name, age) in [("kid", 9), ("teen", 17), ("adult", 40), ("elder", 81)] {
        table.item(&user(name, age)).create().await.unwrap();
    }
    for title in ["rust tips", "rust traits", "go tips"] {
        table.item(&post(title, "kid")).create().await.unwrap();
    }

    let users = table.model::<User>();
    let middle = users.search(User::AGE.between(10, 50)).all().await.unwrap();
    assert_eq!(names(&middle), vec!["adult", "teen"]);
    assert!(
        users
            .search(User::AGE.between(50, 10))
            .all()
            .await
            .unwrap()
            .is_empty()
    );

    let rust = table
        .model::<BlogPost>()
        .search(BlogPost::CONTENT.begins_with("rust"))
        .count()
        .await
        .unwrap();
    assert_eq!(rust, 2);
}

#[tokio::test]
async fn unsupported_searches_are_validation_errors() {
    let table = table();
    let users = table.model::<User>();

    let err = users
        .search(User::DESCRIPTION.eq("x"))
        .all()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = users
        .search(User::NAME.begins_with("a"))
        .all()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = users.search(User::EMAIL.eq("")).all().await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn update_moves_index_entries() {
    let table = table();
    table.item(&user("test", 20)).create().await.unwrap();
    table.item(&user("test", 30)).update().await.unwrap();

    let users = table.model::<User>();
    assert!(users.search(User::AGE.eq(20)).single().await.unwrap().is_none());
    let moved = users.search(User::AGE.eq(30)).single().await.unwrap();
    assert_eq!(moved, Some(user("test", 30)));
}

#[tokio::test]
async fn identical_update_is_byte_identical() {
    let table = table();
    let mut alice = user("alice", 20);
    alice.email = Some("a@example.com".to_string());
    alice.description = Some("same".to_string());

    let created = table.item(&alice).create().await.unwrap();
    let before = table.store().raw(&created.primary_key).unwrap().unwrap();

    let updated = table.item(&alice).update().await.unwrap();
    let after = table.store().raw(&created.primary_key).unwrap().unwrap();

    assert_eq!(created, updated);
    assert_eq!(before, after);
}

#[tokio::test]
async fn delete_removes_item_and_its_index_entries() {
    let table = table();
    let alice = user("alice", 20);
    table.item(&alice).create().await.unwrap();

    assert!(table.item(&alice).delete().await.unwrap());
    assert!(!table.item(&alice).delete().await.unwrap());
    assert!(table.model::<User>().find("alice").await.unwrap().is_none());
    assert_eq!(
        table
            .model::<User>()
            .search(User::AGE.eq(20))
            .count()
            .await
            .unwrap(),
        0
    );

    table.item(&user("bob", 1)).create().await.unwrap();
    assert!(!table.model::<BlogPost>().delete("user#bob").await.unwrap());
    assert!(table.model::<User>().delete("user#bob").await.unwrap());
}

#[tokio::test]
async fn store_failures_propagate_unretried() {
    let table = table();
    table.store().set_unavailable(true).unwrap();

    let err = table.item(&user("test", 20)).create().await.unwrap_err();
    assert!(err.is_transient());
    let err = table.model::<User>().find("test").await.unwrap_err();
    assert!(err.is_transient());

    table.store().set_unavailable(false).unwrap();
    assert!(table.model::<User>().find("test").await.unwrap().is_none());
}

#[tokio::test]
async fn models_outside_the_registry_are_refused() {
    let registry = Registry::builder().register::<User>().build().unwrap();
    let table = Table::new(MemoryStore::new(), registry);

    let err = table.item(&post("p", "test")).create().await.unwrap_err();
    assert!(matches!(err, Error::UnregisteredModel(ref m) if m == "blogpost"));
}

#[tokio::test]
async fn untyped_engine_works_from_the_schema() {
    let table = table();
    let engine = table.engine(<User as single_table::Model>::schema()).unwrap();

    let attributes = [
        ("name".to_string(), Value::from("raw").into()),
        ("age".to_string(), Value::from(5i64).into()),
    ]
    .into_iter()
    .collect();
    let item = engine.create(attributes).await.unwrap();
    assert_eq!(item.get("age"), Some(&Value::Int(5)));

    let found = engine.get("user#raw").await.unwrap().unwrap();
    assert_eq!(found.to_model::<User>().unwrap(), user("raw", 5));
    assert!(matches!(
        found.to_model::<BlogPost>(),
        Err(Error::ModelMismatch { .. })
    ));
}
