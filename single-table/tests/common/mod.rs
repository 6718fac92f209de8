#![allow(dead_code)]

use single_table::{MemoryStore, Model, Registry, Table};

#[derive(Model, Debug, Clone, PartialEq)]
#[model(name = "user")]
pub struct User {
    #[unique_key]
    pub name: String,
    #[search_key]
    pub email: Option<String>,
    #[search_key]
    pub age: Option<i64>,
    pub description: Option<String>,
}

#[derive(Model, Debug, Clone, PartialEq)]
#[model(name = "blogpost")]
pub struct BlogPost {
    #[unique_key]
    pub title: String,
    #[search_key]
    pub content: Option<String>,
    #[relation(User)]
    pub author: Option<String>,
}

#[derive(Model, Debug, Clone, PartialEq)]
#[model(name = "comment")]
pub struct Comment {
    #[unique_key]
    pub title: String,
    #[search_key]
    pub content: Option<String>,
    #[relation(User, raise_if_missing)]
    pub author: Option<String>,
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn registry() -> Registry {
    Registry::builder()
        .register::<User>()
        .register::<BlogPost>()
        .register::<Comment>()
        .build()
        .unwrap()
}

pub fn table() -> Table<MemoryStore> {
    init_logger();
    Table::new(MemoryStore::new(), registry())
}

pub fn user(name: &str, age: i64) -> User {
    User {
        name: name.to_string(),
        email: None,
        age: Some(age),
        description: None,
    }
}

pub fn post(title: &str, author: &str) -> BlogPost {
    BlogPost {
        title: title.to_string(),
        content: Some(title.to_string()),
        author: Some(author.to_string()),
    }
}

pub fn comment(title: &str, author: &str) -> Comment {
    Comment {
        title: title.to_string(),
        content: Some(title.to_string()),
        author: Some(author.to_string()),
    }
}
