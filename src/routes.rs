use actix_web::{delete, get, post, put, web, HttpResponse};

use crate::balance::{compute_balances, Balance, SettlementPolicy};
use crate::debts::{get_debts, Debt};
use crate::error::{ApiError, ApiResult};
use crate::exchange::get_exchanges;
use crate::schemas::{
    ConfirmSettlement, NewExpense, NewGroup, NewSettlement, SplitRequest, SplitResponse,
};
use crate::split::{round_to_2_decimals, split_amount};
use crate::store::{new_id, Store};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(add_group)
        .service(get_group)
        .service(delete_group)
        .service(get_user_groups)
        .service(get_expenses)
        .service(add_expense)
        .service(edit_expense)
        .service(delete_expense)
        .service(get_settlements)
        .service(add_settlement)
        .service(confirm_settlement)
        .service(delete_settlement)
        .service(get_balance)
        .service(get_group_exchanges)
        .service(get_user_debts)
        .service(split);
}

#[put("/groups/{id}")]
async fn add_group(
    store: web::Data<Store>,
    id: web::Path<String>,
    json: web::Json<NewGroup>,
) -> ApiResult<HttpResponse> {
    let group = json.into_inner().into_group(id.into_inner())?;
    store.insert_group(&group).await?;
    tracing::info!(group = %group.id, members = group.members.len(), "group created");
    Ok(HttpResponse::Created().json(group))
}

#[get("/groups/{id}")]
async fn get_group(store: web::Data<Store>, id: web::Path<String>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(store.find_group(&id).await?))
}

#[delete("/groups/{id}")]
async fn delete_group(store: web::Data<Store>, id: web::Path<String>) -> ApiResult<HttpResponse> {
    store.delete_group(&id).await?;
    tracing::info!(group = %id, "group deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[get("/users/{id}/groups")]
async fn get_user_groups(
    store: web::Data<Store>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(store.groups_for_member(&id).await?))
}

#[get("/groups/{id}/expenses")]
async fn get_expenses(store: web::Data<Store>, id: web::Path<String>) -> ApiResult<HttpResponse> {
    let group = store.find_group(&id).await?;
    Ok(HttpResponse::Ok().json(store.expenses_for_group(&group.id).await?))
}

#[post("/groups/{id}/expenses")]
async fn add_expense(
    store: web::Data<Store>,
    id: web::Path<String>,
    expense: web::Json<NewExpense>,
) -> ApiResult<HttpResponse> {
    let group = store.find_group(&id).await?;
    let expense = expense.into_inner().into_expense(new_id(), &group)?;
    store.insert_expense(&expense).await?;
    tracing::info!(group = %group.id, expense = %expense.id, amount = expense.amount, "expense added");
    Ok(HttpResponse::Created().json(expense))
}

#[put("/groups/{id}/expenses/{expense_id}")]
async fn edit_expense(
    store: web::Data<Store>,
    path: web::Path<(String, String)>,
    expense: web::Json<NewExpense>,
) -> ApiResult<HttpResponse> {
    let (group_id, expense_id) = path.into_inner();
    let group = store.find_group(&group_id).await?;
    let existing = store.find_expense(&group.id, &expense_id).await?;
    let expense = expense.into_inner().apply_to(existing, &group)?;
    store.replace_expense(&expense).await?;
    tracing::info!(group = %group.id, expense = %expense.id, "expense edited");
    Ok(HttpResponse::Ok().json(expense))
}

#[delete("/groups/{id}/expenses/{expense_id}")]
async fn delete_expense(
    store: web::Data<Store>,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (group_id, expense_id) = path.into_inner();
    store.delete_expense(&group_id, &expense_id).await?;
    tracing::info!(group = %group_id, expense = %expense_id, "expense deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[get("/groups/{id}/settlements")]
async fn get_settlements(
    store: web::Data<Store>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let group = store.find_group(&id).await?;
    Ok(HttpResponse::Ok().json(store.settlements_for_group(&group.id).await?))
}

#[post("/groups/{id}/settlements")]
async fn add_settlement(
    store: web::Data<Store>,
    id: web::Path<String>,
    settlement: web::Json<NewSettlement>,
) -> ApiResult<HttpResponse> {
    let group = store.find_group(&id).await?;
    let settlement = settlement.into_inner().into_settlement(new_id(), &group)?;
    store.insert_settlement(&settlement).await?;
    tracing::info!(
        group = %group.id,
        settlement = %settlement.id,
        from = %settlement.from_member,
        to = %settlement.to_member,
        "settlement recorded"
    );
    Ok(HttpResponse::Created().json(settlement))
}

#[put("/groups/{id}/settlements/{settlement_id}/confirm")]
async fn confirm_settlement(
    store: web::Data<Store>,
    path: web::Path<(String, String)>,
    json: web::Json<ConfirmSettlement>,
) -> ApiResult<HttpResponse> {
    let (group_id, settlement_id) = path.into_inner();
    let mut settlement = store.find_settlement(&group_id, &settlement_id).await?;
    settlement.confirm(&json.member)?;
    store.confirm_settlement(&group_id, &settlement_id).await?;
    tracing::info!(group = %group_id, settlement = %settlement_id, "settlement confirmed");
    Ok(HttpResponse::Ok().json(settlement))
}

#[delete("/groups/{id}/settlements/{settlement_id}")]
async fn delete_settlement(
    store: web::Data<Store>,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (group_id, settlement_id) = path.into_inner();
    store.delete_settlement(&group_id, &settlement_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

fn rounded(balance: Balance) -> Balance {
    balance
        .into_iter()
        .map(|(member, value)| (member, round_to_2_decimals(value)))
        .collect()
}

#[get("/groups/{id}/balance")]
async fn get_balance(
    store: web::Data<Store>,
    policy: web::Data<SettlementPolicy>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let ledger = store.load_ledger(&id).await?;
    Ok(HttpResponse::Ok().json(rounded(compute_balances(&ledger, **policy))))
}

#[get("/groups/{id}/exchanges")]
async fn get_group_exchanges(
    store: web::Data<Store>,
    policy: web::Data<SettlementPolicy>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let ledger = store.load_ledger(&id).await?;
    Ok(HttpResponse::Ok().json(get_exchanges(&ledger, **policy)))
}

#[get("/users/{id}/debts")]
async fn get_user_debts(
    store: web::Data<Store>,
    policy: web::Data<SettlementPolicy>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let ledgers = store.ledgers_for_member(&id).await?;
    let debts: Vec<Debt> = get_debts(&id, &ledgers, **policy)
        .into_iter()
        .map(|debt| Debt {
            amount: round_to_2_decimals(debt.amount),
            ..debt
        })
        .collect();
    Ok(HttpResponse::Ok().json(debts))
}

#[post("/split")]
async fn split(json: web::Json<SplitRequest>) -> ApiResult<HttpResponse> {
    let request = json.into_inner();
    if !(request.amount.is_finite() && request.amount > 0.0) {
        return Err(ApiError::validation("amount must be a positive number"));
    }
    let share = split_amount(request.amount, &request.participants)?;
    Ok(HttpResponse::Ok().json(SplitResponse {
        share,
        display: round_to_2_decimals(share),
    }))
}
