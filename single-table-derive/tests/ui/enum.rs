use single_table_derive::Model;

#[derive(Model)]
enum Shape {
    Circle,
}

fn main() {}
