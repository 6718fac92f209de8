use single_table_derive::Model;

#[derive(Model)]
#[model(name = "a#b")]
struct Hashed {
    #[unique_key]
    id: String,
}

fn main() {}
