use crate::services::operation::{Field, OperationDef, ResponseShape};

pub const OPERATIONS: &[OperationDef] = &[OperationDef::get("list_negotiation_types", "/negociacoes")
    .query(&[
        Field::same("cliente"),
        Field::same("situacao"),
        Field::new("tipo_modalidade", "tipoModalidade"),
    ])
    .shape(ResponseShape::AllPages)];
