use single_table_derive::Model;

#[derive(Model)]
struct NoKey {
    name: String,
}

fn main() {}
