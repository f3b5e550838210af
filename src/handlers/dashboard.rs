use axum::{extract::State, response::Response, Extension};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::str::FromStr;

use super::{records::scope_filter, COLLECTIONS};
use crate::api::envelope;
use crate::executor::TENANT_FIELD;
use crate::middleware::{RequestContext, RequestId};
use crate::rbac::Action;
use crate::state::AppState;
use crate::store::Filter;

/// GET /api/dashboard - tenant-scoped aggregate summary.
///
/// Readable under either the dashboard rule or plain contract read access,
/// so contract readers keep their overview without a dedicated dashboard
/// grant.
pub async fn summary(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    if let Err(err) = state.matrix.require_any(
        &ctx,
        &[("dashboard", Action::Read), ("contratos", Action::Read)],
    ) {
        return envelope::failure(request_id, &err);
    }

    let store = state.store.clone();
    let tenant = ctx.tenant_id();
    let result = state
        .executor
        .execute(request_id, &ctx, "dashboard", Action::Read, || async move {
            let counts = try_join_all(
                COLLECTIONS
                    .iter()
                    .filter(|c| c.scope_field == TENANT_FIELD)
                    .map(|col| {
                        let store = store.clone();
                        let filter = scope_filter(col, tenant);
                        async move {
                            store
                                .count(col.name, &filter)
                                .await
                                .map(|total| (col.name, total))
                        }
                    }),
            )
            .await?;

            let contratos_filter = match tenant {
                Some(tenant) => Filter::new().eq(TENANT_FIELD, tenant.to_string()),
                None => Filter::new(),
            };
            let contratos = store.list("contratos", &contratos_filter).await?;
            let valor_total: Decimal = contratos
                .iter()
                .filter_map(|r| r.get("valor"))
                .filter_map(decimal_value)
                .sum();

            let mut count_map = Map::new();
            for (name, total) in counts {
                count_map.insert(name.to_string(), json!(total));
            }

            Ok(json!({
                "counts": count_map,
                "contratos_valor_total": valor_total.to_string(),
            }))
        })
        .await;
    envelope::respond(request_id, result)
}

fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}
