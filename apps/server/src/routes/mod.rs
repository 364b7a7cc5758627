mod health;
mod monitoring;

macros_utils::routes! {
    mount health,
    mount monitoring,
}
