use single_table_derive::Model;

#[derive(Model)]
struct TwoKeys {
    #[unique_key]
    a: String,
    #[unique_key]
    b: String,
}

fn main() {}
