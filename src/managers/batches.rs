use crate::services::operation::{Field, OperationDef, ResponseShape};

/// Debt batches (lotes) distributed to the collection agency.
pub const OPERATIONS: &[OperationDef] = &[
    OperationDef::get("list_batches", "/lotes")
        .query(&[Field::same("situacao")])
        .shape(ResponseShape::AllPages),
    OperationDef::get("get_batch", "/lotes/{id}"),
    OperationDef::get("list_batch_records", "/lotes/{id}/registros")
        .query(&[Field::same("selector")])
        .shape(ResponseShape::Page),
    OperationDef::get("list_batch_records_delta", "/lotes/registros")
        .query(&[
            Field::new("data_inclusao", "dataInclusao"),
            Field::new("data_exclusao", "dataExclusao"),
            Field::same("selector"),
        ])
        .shape(ResponseShape::AllPages),
];
