use crate::services::operation::{Field, OperationDef, ResponseShape};

pub const OPERATIONS: &[OperationDef] = &[
    OperationDef::get("list_installments", "/parcelas")
        .query(&[Field::same("cliente"), Field::same("contrato")])
        .shape(ResponseShape::AllPages),
    OperationDef::get("get_installment", "/parcelas/{id}"),
    OperationDef::get("get_installment_boleto", "/parcelas/{id}/boleto"),
    OperationDef::get("get_installment_boleto_pdf", "/parcelas/{id}/boleto.pdf")
        .shape(ResponseShape::Binary("application/pdf")),
    OperationDef::post("register_installment_boleto", "/parcelas/{id}/boleto/registrar"),
];
