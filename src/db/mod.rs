//! Remote data layer (GraphQL todo API).

pub mod graphql;

pub use graphql::GraphQlStore;

/// GraphQL documents for the todo API.
pub mod queries {
    /// Fields selected for every todo.
    pub const TODO_FIELDS: &str =
        "id name recommendations_json notes priority completed due_date oid";

    /// Fields a partial update may set, with their GraphQL types.
    pub const UPDATABLE_FIELDS: &[(&str, &str)] = &[
        ("name", "String"),
        ("due_date", "String"),
        ("notes", "String"),
        ("priority", "Int"),
        ("completed", "Boolean"),
        ("recommendations_json", "String"),
    ];

    pub const LIST_TODOS: &str = "query TodosByOwner($oid: String!) { \
        todos(filter: { oid: { eq: $oid } }) { items { \
        id name recommendations_json notes priority completed due_date oid } } }";

    pub const GET_TODO: &str = "query Todo_by_pk($id: Int!) { todo_by_pk(id: $id) { \
        id name recommendations_json notes priority completed due_date oid } }";

    pub const CREATE_TODO: &str = "mutation Createtodo($name: String!, $oid: String!) { \
        createtodo(item: { name: $name, oid: $oid }) { \
        id name recommendations_json notes priority completed due_date oid } }";

    pub const DELETE_TODO: &str =
        "mutation RemoveTodo($id: Int!) { deletetodo(id: $id) { id } }";
}
