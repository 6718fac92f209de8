mod common;

use common::{BlogPost, Comment, User, init_logger};
use single_table::{
    FieldRole, MemoryStore, Model, Registry, Relations, SchemaError, Table, Value,
};

#[derive(Model, Debug, Clone, PartialEq)]
pub struct Category {
    #[unique_key]
    pub slug: String,
    #[relation(Category)]
    pub parent: Option<String>,
    pub position: Option<u32>,
    pub visible: bool,
}

fn category(slug: &str, parent: Option<&str>) -> Category {
    Category {
        slug: slug.to_string(),
        parent: parent.map(str::to_string),
        position: Some(1),
        visible: true,
    }
}

#[test]
fn derived_schema_carries_roles_and_names() {
    let schema = User::schema();
    assert_eq!(schema.model_name(), "user");
    assert_eq!(schema.unique_key().name(), "name");
    assert_eq!(schema.field("email").map(|f| f.role()), Some(FieldRole::SearchKey));
    assert_eq!(schema.field("description").map(|f| f.role()), Some(FieldRole::Plain));
    assert!(schema.relations().next().is_none());

    let author = Comment::schema().field("author").unwrap();
    assert_eq!(author.role(), FieldRole::Relation);
    assert!(author.raises_if_missing());
    assert_eq!(author.referenced_model().map(|m| m.model_name()), Some("user"));
    assert!(!BlogPost::schema().field("author").unwrap().raises_if_missing());

    assert_eq!(Category::schema().model_name(), "category");
    assert_eq!(User::AGE.name(), "age");
    assert_eq!(Category::PARENT.name(), "parent");
}

#[test]
fn discover_collects_every_derived_model() {
    let registry = Registry::discover().unwrap();
    let mut names: Vec<&str> = registry.models().map(|m| m.model_name()).collect();
    names.sort();
    assert_eq!(names, vec!["blogpost", "category", "comment", "user"]);

    let referrers: Vec<String> = registry
        .referrers(User::schema().id())
        .into_iter()
        .map(|(model, field)| format!("{}.{}", model.model_name(), field.name()))
        .collect();
    assert_eq!(referrers.len(), 2);
    assert!(referrers.contains(&"blogpost.author".to_string()));
    assert!(referrers.contains(&"comment.author".to_string()));
}

#[test]
fn builder_requires_targets_first() {
    let err = Registry::builder()
        .register::<BlogPost>()
        .register::<User>()
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        SchemaError::UnregisteredTarget {
            model: "blogpost".to_string(),
            field: "author".to_string(),
            target: "user".to_string(),
        }
    );

    let registry = Registry::builder()
        .register::<User>()
        .register::<User>()
        .register::<Category>()
        .build()
        .unwrap();
    assert_eq!(registry.models().count(), 2);
    assert!(registry.contains(Category::schema()));
    assert!(!registry.contains(BlogPost::schema()));
}

#[tokio::test]
async fn self_relation_resolves_both_ways() {
    init_logger();
    let registry = Registry::builder().register::<Category>().build().unwrap();
    let table = Table::new(MemoryStore::new(), registry);

    let root = category("root", None);
    let child = category("child", Some("root"));
    table.item(&root).create().await.unwrap();
    table.item(&child).create().await.unwrap();

    assert_eq!(
        table.model::<Category>().find("child").await.unwrap(),
        Some(child.clone())
    );
    assert_eq!(
        table.item(&child).related::<Category>().await.unwrap(),
        vec![root.clone()]
    );
    assert_eq!(
        table.item(&root).referencing::<Category>().await.unwrap(),
        vec![child.clone()]
    );
    assert!(
        table
            .item(&root)
            .get_relation(Relations::all())
            .await
            .unwrap()
            .is_empty()
    );

    let children = table
        .model::<Category>()
        .search(Category::PARENT.eq("root"))
        .all()
        .await
        .unwrap();
    assert_eq!(children, vec![child]);

    let item = table
        .model::<Category>()
        .get_item("category#root")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.get("position"), Some(&Value::Int(1)));
    assert_eq!(item.get("visible"), Some(&Value::Bool(true)));
}
