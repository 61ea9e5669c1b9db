use crate::services::operation::{BodyDef, Field, OperationDef, ResponseShape};

/// Contact history entries (tabulações).
pub const OPERATIONS: &[OperationDef] = &[
    OperationDef::get("list_tabulations", "/tabulacoes").shape(ResponseShape::AllPages),
    OperationDef::post("create_tabulation", "/tabulacoes").body(BodyDef::Fields(&[
        Field::same("cliente"),
        Field::same("contrato"),
        Field::same("parcela"),
        Field::same("tabulacao"),
        Field::same("telefone"),
        Field::same("observacao"),
    ])),
];
