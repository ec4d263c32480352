use super::{AggregateId, Origin};

/// Трейт для корня агрегата
///
/// Все агрегаты здесь являются проекциями удалённых записей: локально ничего не
/// хранится, а `collection_name` совпадает с сегментом пути в API.
pub trait AggregateRoot {
    /// Тип идентификатора агрегата
    type Id: AggregateId;

    /// Получить ID записи
    fn id(&self) -> &Self::Id;

    // ============================================================================
    // Метаданные класса агрегата (статические данные)
    // ============================================================================

    /// Индекс агрегата в системе (например, "a025")
    fn aggregate_index() -> &'static str;

    /// Сегмент пути в REST API (например, "return-request")
    fn collection_name() -> &'static str;

    /// Имя элемента для UI (единственное число)
    fn element_name() -> &'static str;

    /// Имя списка для UI (множественное число)
    fn list_name() -> &'static str;

    /// Какой бэкенд владеет записью
    fn origin() -> Origin;

    /// Полное имя агрегата для системы (например, "a025_return-request")
    fn full_name() -> String {
        format!("{}_{}", Self::aggregate_index(), Self::collection_name())
    }
}
