use crate::{
	error::ensure_state,
	objects::WitnessObject,
	Database, Result,
};
use onyx_primitives::WitnessId;
use onyx_protocol::operations::{OperationResult, WitnessCreateOperation, WitnessUpdateOperation};

pub(crate) fn create(db: &mut Database, op: &WitnessCreateOperation) -> Result<OperationResult> {
	db.account(op.witness_account)?;
	ensure_state!(
		db.witness_by_account(op.witness_account).is_none(),
		"account {} already operates a witness",
		op.witness_account
	);
	let witness = db.create::<WitnessObject>(|instance| WitnessObject {
		id: WitnessId::new(instance),
		witness_account: op.witness_account,
		signing_key: op.block_signing_key,
		url: op.url.clone(),
		last_aslot: 0,
		total_votes: 0,
		total_missed: 0,
		last_confirmed_block_num: 0,
	})?;
	Ok(OperationResult::ObjectId(witness.id.into()))
}

pub(crate) fn update(db: &mut Database, op: &WitnessUpdateOperation) -> Result<OperationResult> {
	let witness = db.witness(op.witness)?.clone();
	ensure_state!(
		witness.witness_account == op.witness_account,
		"witness {} is not operated by account {}",
		op.witness,
		op.witness_account
	);
	db.modify::<WitnessObject>(op.witness.instance(), |obj| {
		if let Some(url) = &op.new_url {
			obj.url = url.clone();
		}
		if let Some(key) = &op.new_signing_key {
			obj.signing_key = *key;
		}
	})?;
	Ok(OperationResult::None)
}
