use single_table_derive::Model;

#[derive(Model)]
struct Wrapper<T> {
    #[unique_key]
    id: T,
}

fn main() {}
