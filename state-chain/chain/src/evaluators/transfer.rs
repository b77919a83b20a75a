use crate::{error::ensure_policy, Database, Result};
use onyx_protocol::operations::{OperationResult, TransferOperation};

pub(crate) fn apply(db: &mut Database, op: &TransferOperation) -> Result<OperationResult> {
	let from = db.account(op.from)?.clone();
	let to = db.account(op.to)?.clone();
	let asset = db.asset(op.amount.asset_id)?.clone();

	// A transfer-restricted asset only moves with its issuer on one end.
	ensure_policy!(
		!asset.is_transfer_restricted() || op.from == asset.issuer || op.to == asset.issuer,
		"asset {} is transfer-restricted",
		asset.symbol
	);
	ensure_policy!(
		db.is_authorized_asset(&from, &asset),
		"account {} is not authorized to transact asset {}",
		from.name,
		asset.symbol
	);
	ensure_policy!(
		db.is_authorized_asset(&to, &asset),
		"account {} is not authorized to receive asset {}",
		to.name,
		asset.symbol
	);

	db.adjust_balance(op.from, onyx_protocol::Asset::new(-op.amount.amount, op.amount.asset_id))?;
	db.adjust_balance(op.to, op.amount)?;
	Ok(OperationResult::None)
}
