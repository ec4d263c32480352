pub mod events;

pub use events::EditOutcome;

use crate::usecases::common::UseCaseMetadata;

pub struct ReceiveQuantities;

impl UseCaseMetadata for ReceiveQuantities {
    fn usecase_index() -> &'static str {
        "u602"
    }

    fn usecase_name() -> &'static str {
        "receive_quantities"
    }

    fn display_name() -> &'static str {
        "Количество к приёмке"
    }

    fn description() -> &'static str {
        "Оптимистичное редактирование принятых и списанных количеств"
    }
}
