pub mod history;
pub mod mutate;
pub mod navigate;
pub mod node_tree;
pub mod path_match;
pub mod validate;
