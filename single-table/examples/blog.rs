use single_table::{Error, MemoryStore, Model, Registry, Relations, Store, Table, TableConfig};

#[derive(Model, Debug, Clone, PartialEq)]
pub struct User {
    #[unique_key]
    pub name: String,
    #[search_key]
    pub age: Option<i64>,
    pub email: Option<String>,
}

#[derive(Model, Debug, Clone, PartialEq)]
#[model(name = "post")]
pub struct BlogPost {
    #[unique_key]
    pub title: String,
    #[search_key]
    pub tag: Option<String>,
    #[relation(User, raise_if_missing)]
    pub author: Option<String>,
}

async fn run<S: Store>(table: Table<S>) -> Result<(), Error> {
    table
        .item(&User {
            name: "Alice".to_string(),
            age: Some(25),
            email: Some("alice@example.com".to_string()),
        })
        .create()
        .await?;

    for (title, tag) in [("Hello", "intro"), ("Single table", "design")] {
        table
            .item(&BlogPost {
                title: title.to_string(),
                tag: Some(tag.to_string()),
                author: Some("Alice".to_string()),
            })
            .update()
            .await?;
    }

    let alice = table.model::<User>().search(User::AGE.eq(25)).single().await?;
    println!("{:?}", alice);

    if let Some(alice) = alice {
        let posts = table.item(&alice).referencing::<BlogPost>().await?;
        println!("{} wrote {} posts", alice.name, posts.len());
    }

    let design = table
        .model::<BlogPost>()
        .search(BlogPost::TAG.begins_with("des"))
        .all()
        .await?;
    for post in &design {
        let authors = table.item(post).get_relation(Relations::all()).await?;
        println!("{} -> {:?}", post.title, authors);
    }

    let orphan = BlogPost {
        title: "Orphan".to_string(),
        tag: None,
        author: Some("Nobody".to_string()),
    };
    if let Err(e) = table.item(&orphan).create().await {
        println!("rejected: {}", e);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let registry = Registry::discover()?;

    if std::env::var(single_table::ENV_PD_ENDPOINTS).is_ok() {
        let config = TableConfig::from_env();
        let table = Table::connect(&config, registry).await?;
        table.store().drop_all().await?;
        run(table).await
    } else {
        run(Table::new(MemoryStore::new(), registry)).await
    }
}
