use single_table_derive::Model;

#[derive(Model)]
struct Doubled {
    #[unique_key]
    #[search_key]
    id: String,
}

fn main() {}
