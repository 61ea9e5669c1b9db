use crate::services::operation::{Field, OperationDef, ResponseShape};

pub const OPERATIONS: &[OperationDef] = &[
    OperationDef::get("list_clients", "/clientes")
        .query(&[
            Field::same("nome"),
            Field::same("cic"),
            Field::new("tipo_pessoa", "tipoPessoa"),
            Field::same("codigo"),
            Field::same("cliente"),
            Field::new("numero_contrato", "numeroContrato"),
            Field::selector(),
        ])
        .shape(ResponseShape::Limited),
    OperationDef::get("get_client", "/clientes/{id}").query(&[Field::same("selector")]),
];
