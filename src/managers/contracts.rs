use crate::services::operation::{Field, OperationDef, ResponseShape};

pub const OPERATIONS: &[OperationDef] = &[
    OperationDef::get("list_contracts", "/contratos")
        .query(&[Field::same("cliente"), Field::same("situacao"), Field::selector()])
        .shape(ResponseShape::AllPages),
    OperationDef::get("get_contract", "/contratos/{id}").query(&[Field::same("selector")]),
];
