use crate::errors::ApiError;
use crate::services::operation::{Args, BodyDef, Field, OperationDef, ResponseShape};
use crate::services::request_executor::Effect;
use serde_json::{Map, Value};

pub const OPERATIONS: &[OperationDef] = &[
    OperationDef::get("list_agreements", "/acordos")
        .query(&[
            Field::same("cliente"),
            Field::new("numero_acordo", "numeroAcordo"),
            Field::same("situacao"),
            Field::same("tipo"),
            Field::new("data_inicio", "dataInclusaoInicio"),
            Field::new("data_fim", "dataInclusaoFim"),
            Field::new("data_hora_modificacao_inicio", "dataHoraModificacaoInicio"),
            Field::new("data_hora_modificacao_fim", "dataHoraModificacaoFim"),
            Field::selector(),
        ])
        .shape(ResponseShape::AllPages),
    OperationDef::get("get_agreement", "/acordos/{id}").query(&[Field::same("selector")]),
    // Simulation has no upstream side effects.
    OperationDef::post("simulate_agreement", "/acordos/simular")
        .body(BodyDef::Fields(&[
            Field::same("cliente"),
            Field::same("negociacao"),
            Field::new("meio_pagamento", "meioPagamento"),
            Field::same("parcelas"),
            Field::same("parcelamentos"),
            Field::new("calcular_desconto_parcelamento", "calcularDescontoParcelamento"),
        ]))
        .effect(Effect::Read),
    OperationDef::post("execute_agreement", "/acordos/efetivar")
        .body(BodyDef::Custom(execute_agreement_body)),
    OperationDef::post("activate_agreement", "/acordos/{id}/ativar"),
    OperationDef::post("cancel_agreement", "/acordos/{id}/cancelar")
        .body(BodyDef::Fields(&[Field::same("motivo")])),
    OperationDef::post("integrate_agreement", "/acordos/{id}/integrar"),
    OperationDef::post("conclude_agreement", "/acordos/{id}/concluir"),
    OperationDef::get("get_agreement_boleto", "/acordos/{acordo_id}/boletos/{parcela}"),
    OperationDef::get("get_agreement_boleto_pdf", "/acordos/{acordo_id}/boletos/{parcela}.pdf")
        .shape(ResponseShape::Binary("application/pdf")),
    OperationDef::get("get_agreement_boleto_data", "/acordos/parcelas/{parcela_id}/boleto"),
    OperationDef::post(
        "register_agreement_boleto",
        "/acordos/{acordo_id}/boletos/{parcela}/registrar",
    ),
    OperationDef::post("register_agreement_boletos", "/acordos/{acordo_id}/boletos/registrar")
        .body(BodyDef::Fields(&[Field::same("parcelas")])),
    OperationDef::post("settle_agreement_installment", "/acordos/{parcela_id}/liquidar").body(
        BodyDef::Fields(&[
            Field::new("data_liquidacao", "dataLiquidacao"),
            Field::new("valor_recebido", "valorRecebido"),
            Field::new("data_credito", "dataCredito"),
            Field::new("forma_liquidacao", "formaLiquidacao"),
        ]),
    ),
    OperationDef::post("reverse_agreement_payment", "/acordos/{parcela_id}/estornar")
        .body(BodyDef::Fields(&[Field::new("pagamento_id", "pagamento")])),
];

/// The upstream computes the installment schedule itself and rejects a plan that
/// already lists `parcelas`, so that key is stripped from `parcelamento`.
fn execute_agreement_body(args: &Args) -> Result<Option<Value>, ApiError> {
    let mut body = Map::new();
    for (arg, key) in [
        ("cliente", "cliente"),
        ("negociacao", "negociacao"),
        ("meio_pagamento", "meioPagamento"),
        ("parcelas", "parcelas"),
    ] {
        if let Some(value) = args.get(arg) {
            body.insert(key.to_string(), value.clone());
        }
    }

    let plan = match args.get("parcelamento") {
        Some(Value::Object(plan)) => plan
            .iter()
            .filter(|(key, _)| key.as_str() != "parcelas")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Map<String, Value>>(),
        _ => return Err(ApiError::validation("parcelamento must be an object")),
    };
    body.insert("parcelamento".to_string(), Value::Object(plan));

    for (arg, key) in [("observacao", "observacao"), ("pagamentos", "pagamentos")] {
        match args.get(arg) {
            Some(Value::String(s)) if s.trim().is_empty() => {}
            Some(Value::Array(items)) if items.is_empty() => {}
            Some(Value::Null) | None => {}
            Some(value) => {
                body.insert(key.to_string(), value.clone());
            }
        }
    }
    Ok(Some(Value::Object(body)))
}
