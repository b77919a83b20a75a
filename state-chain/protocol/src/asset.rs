//! Share amounts tagged with their asset, and exact-rational prices.
//!
//! Prices are never reduced implicitly on the wire; comparison and equality
//! cross-multiply in 128 bits so `2/4 == 1/2` regardless of representation.
//! No floating point exists anywhere in consensus code.

use crate::{ensure, MathError, ValidationResult};
use codec::{Decode, Encode};
use onyx_primitives::{
	constants::{COLLATERAL_RATIO_DENOM, MAX_COLLATERAL_RATIO, MAX_SHARE_SUPPLY, MIN_COLLATERAL_RATIO},
	AssetId, ShareAmount,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(
	Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize,
	Deserialize,
)]
pub struct Asset {
	pub amount: ShareAmount,
	pub asset_id: AssetId,
}

impl Asset {
	pub const fn new(amount: ShareAmount, asset_id: AssetId) -> Self {
		Self { amount, asset_id }
	}

	pub const fn core(amount: ShareAmount) -> Self {
		Self { amount, asset_id: onyx_primitives::CORE_ASSET }
	}

	/// Converts this amount at `price`, truncating toward zero.
	pub fn multiply(self, price: &Price) -> Result<Asset, MathError> {
		self.multiply_inner(price, false)
	}

	/// Converts this amount at `price`, rounding away from zero. Used where
	/// the payer must not underpay, e.g. collateral covering debt.
	pub fn multiply_round_up(self, price: &Price) -> Result<Asset, MathError> {
		self.multiply_inner(price, true)
	}

	fn multiply_inner(self, price: &Price, round_up: bool) -> Result<Asset, MathError> {
		let (num, den, out_asset) = if self.asset_id == price.base.asset_id {
			(price.quote.amount, price.base.amount, price.quote.asset_id)
		} else if self.asset_id == price.quote.asset_id {
			(price.base.amount, price.quote.amount, price.base.asset_id)
		} else {
			return Err(MathError::IncompatibleAsset);
		};
		if den <= 0 {
			return Err(MathError::DivisionByZero);
		}
		let product = self.amount as i128 * num as i128;
		let mut result = product / den as i128;
		if round_up && product % den as i128 != 0 {
			result += 1;
		}
		if result > MAX_SHARE_SUPPLY as i128 || result < 0 {
			return Err(MathError::Overflow);
		}
		Ok(Asset::new(result as ShareAmount, out_asset))
	}
}

/// An exact rational exchange rate between two assets:
/// `base.amount / quote.amount`.
#[derive(Copy, Clone, Debug, Default, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Price {
	pub base: Asset,
	pub quote: Asset,
}

impl PartialEq for Price {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl PartialOrd for Price {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Price {
	fn cmp(&self, other: &Self) -> Ordering {
		(self.base.asset_id, self.quote.asset_id)
			.cmp(&(other.base.asset_id, other.quote.asset_id))
			.then_with(|| {
				let lhs = self.base.amount as i128 * other.quote.amount as i128;
				let rhs = other.base.amount as i128 * self.quote.amount as i128;
				lhs.cmp(&rhs)
			})
	}
}

/// Reduces `num / den` by their gcd, then halves both until each fits a
/// share amount. Tiny positions divided by large ratios must never collapse
/// a side to zero, hence the final max(1).
fn reduce_ratio(mut num: u128, mut den: u128) -> (ShareAmount, ShareAmount) {
	fn gcd(mut a: u128, mut b: u128) -> u128 {
		while b != 0 {
			(a, b) = (b, a % b);
		}
		a.max(1)
	}
	let divisor = gcd(num, den);
	num /= divisor;
	den /= divisor;
	while num > MAX_SHARE_SUPPLY as u128 || den > MAX_SHARE_SUPPLY as u128 {
		num >>= 1;
		den >>= 1;
	}
	(num.max(1) as ShareAmount, den.max(1) as ShareAmount)
}

impl Price {
	pub const fn new(base: Asset, quote: Asset) -> Self {
		Self { base, quote }
	}

	pub fn validate(&self) -> ValidationResult {
		ensure!(self.base.amount > 0, "price base amount must be positive");
		ensure!(self.quote.amount > 0, "price quote amount must be positive");
		ensure!(
			self.base.asset_id != self.quote.asset_id,
			"price must relate two distinct assets"
		);
		Ok(())
	}

	pub fn is_null(&self) -> bool {
		*self == Self::default()
	}

	/// The same rate quoted in the opposite direction.
	pub fn invert(self) -> Self {
		Self { base: self.quote, quote: self.base }
	}

	/// The highest representable price of `base` in terms of `quote`.
	pub fn max(base: AssetId, quote: AssetId) -> Self {
		Self::new(Asset::new(MAX_SHARE_SUPPLY, base), Asset::new(1, quote))
	}

	/// The lowest representable price of `base` in terms of `quote`.
	pub fn min(base: AssetId, quote: AssetId) -> Self {
		Self::new(Asset::new(1, base), Asset::new(MAX_SHARE_SUPPLY, quote))
	}

	/// The margin-call trigger price of a position, oriented
	/// collateral/debt: the position is safe while its collateralization
	/// stays above this.
	///
	/// Derived by scaling debt/collateral with `collateral_ratio`, then
	/// inverting; the ratio is reduced so scaled amounts stay representable
	/// even for maximal positions.
	pub fn call_price(debt: Asset, collateral: Asset, collateral_ratio: u16) -> Self {
		let (num, den) = reduce_ratio(
			debt.amount.max(0) as u128 * collateral_ratio as u128,
			collateral.amount.max(0) as u128 * COLLATERAL_RATIO_DENOM as u128,
		);
		Self::new(Asset::new(num, debt.asset_id), Asset::new(den, collateral.asset_id)).invert()
	}
}

/// A published price feed for a market-issued asset. `settlement_price` is
/// quoted debt/collateral.
#[derive(
	Copy, Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize,
)]
pub struct PriceFeed {
	pub settlement_price: Price,
	pub maintenance_collateral_ratio: u16,
	pub maximum_short_squeeze_ratio: u16,
	/// Rate at which the asset's fee pool buys core to pay fees.
	pub core_exchange_rate: Price,
}

impl PriceFeed {
	pub fn validate(&self) -> ValidationResult {
		if !self.settlement_price.is_null() {
			self.settlement_price.validate()?;
		}
		for (name, ratio) in [
			("maintenance_collateral_ratio", self.maintenance_collateral_ratio),
			("maximum_short_squeeze_ratio", self.maximum_short_squeeze_ratio),
		] {
			ensure!(
				(MIN_COLLATERAL_RATIO..=MAX_COLLATERAL_RATIO).contains(&ratio),
				"{name} {ratio} outside [{MIN_COLLATERAL_RATIO}, {MAX_COLLATERAL_RATIO}]"
			);
		}
		Ok(())
	}

	pub fn has_feed(&self) -> bool {
		!self.settlement_price.is_null()
	}

	/// The worst price (most collateral per unit of debt) a margin call may
	/// pay: `settlement_price / maximum_short_squeeze_ratio`, quoted
	/// debt/collateral.
	pub fn max_short_squeeze_price(&self) -> Price {
		let sp = &self.settlement_price;
		let (num, den) = reduce_ratio(
			sp.base.amount as u128 * COLLATERAL_RATIO_DENOM as u128,
			sp.quote.amount as u128 * self.maximum_short_squeeze_ratio as u128,
		);
		Price::new(
			Asset::new(num, sp.base.asset_id),
			Asset::new(den, sp.quote.asset_id),
		)
	}

	/// The minimum collateralization (collateral/debt) a position must hold
	/// to avoid a margin call.
	pub fn maintenance_collateralization(&self) -> Price {
		let sp = &self.settlement_price;
		let (num, den) = reduce_ratio(
			sp.quote.amount as u128 * self.maintenance_collateral_ratio as u128,
			sp.base.amount as u128 * COLLATERAL_RATIO_DENOM as u128,
		);
		Price::new(
			Asset::new(num, sp.quote.asset_id),
			Asset::new(den, sp.base.asset_id),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use onyx_primitives::CORE_ASSET;
	use proptest::prelude::*;

	const USD: AssetId = AssetId::new(1);

	fn price(base: ShareAmount, quote: ShareAmount) -> Price {
		Price::new(Asset::new(base, USD), Asset::new(quote, CORE_ASSET))
	}

	#[test]
	fn equality_ignores_fraction_representation() {
		assert_eq!(price(1, 2), price(2, 4));
		assert_ne!(price(1, 2), price(2, 3));
	}

	#[test]
	fn ordering_cross_multiplies() {
		assert!(price(1, 3) < price(1, 2));
		assert!(price(333_333, 1_000_000) < price(1, 3) || price(333_333, 1_000_000) == price(1, 3));
		assert!(price(333_334, 1_000_000) > price(1, 3));
	}

	#[test]
	fn extreme_prices_are_valid() {
		Price::max(USD, CORE_ASSET).validate().unwrap();
		Price::min(USD, CORE_ASSET).validate().unwrap();
		assert!(Price::min(USD, CORE_ASSET) < Price::max(USD, CORE_ASSET));
	}

	#[test]
	fn multiply_truncates_toward_zero() {
		// 10 USD at 3 USD / 7 CORE -> 23.33 CORE.
		let got = Asset::new(10, USD).multiply(&price(3, 7)).unwrap();
		assert_eq!(got, Asset::new(23, CORE_ASSET));
		let up = Asset::new(10, USD).multiply_round_up(&price(3, 7)).unwrap();
		assert_eq!(up, Asset::new(24, CORE_ASSET));
	}

	#[test]
	fn multiply_converts_both_directions() {
		let p = price(2, 10);
		assert_eq!(Asset::new(4, USD).multiply(&p).unwrap(), Asset::new(20, CORE_ASSET));
		assert_eq!(Asset::new(20, CORE_ASSET).multiply(&p).unwrap(), Asset::new(4, USD));
		assert_eq!(
			Asset::new(1, AssetId::new(9)).multiply(&p),
			Err(MathError::IncompatibleAsset)
		);
	}

	#[test]
	fn multiply_rejects_overflow_past_max_supply() {
		let p = price(1, MAX_SHARE_SUPPLY);
		assert_eq!(Asset::new(2, USD).multiply(&p), Err(MathError::Overflow));
	}

	#[test]
	fn call_price_scales_debt_by_the_ratio() {
		// debt 1 USD, collateral 2 CORE, ratio 1.75 => trigger at
		// collateralization 2000/1750 CORE per USD.
		let cp = Price::call_price(Asset::new(1, USD), Asset::new(2, CORE_ASSET), 1750);
		assert_eq!(cp.base.asset_id, CORE_ASSET);
		assert_eq!(cp.quote.asset_id, USD);
		assert_eq!(
			cp,
			Price::new(Asset::new(2000, CORE_ASSET), Asset::new(1750, USD))
		);
	}

	#[test]
	fn call_price_survives_maximal_positions() {
		let cp = Price::call_price(
			Asset::new(MAX_SHARE_SUPPLY, USD),
			Asset::new(1, CORE_ASSET),
			MAX_COLLATERAL_RATIO,
		);
		cp.validate().unwrap();
	}

	#[test]
	fn squeeze_price_divides_the_feed() {
		let feed = PriceFeed {
			// 1 USD per 15 CORE.
			settlement_price: price(1, 15),
			maintenance_collateral_ratio: 1750,
			maximum_short_squeeze_ratio: 1500,
			core_exchange_rate: price(1, 1),
		};
		// 1000/(15 * 1500) == 1 USD per 22.5 CORE.
		assert_eq!(feed.max_short_squeeze_price(), price(1000, 22_500));
		// Minimum collateralization: 15 * 1.75 CORE per USD.
		assert_eq!(
			feed.maintenance_collateralization(),
			Price::new(Asset::new(26_250, CORE_ASSET), Asset::new(1000, USD))
		);
	}

	proptest! {
		#[test]
		fn comparator_is_total_and_antisymmetric(
			a in 1..MAX_SHARE_SUPPLY, b in 1..MAX_SHARE_SUPPLY,
			c in 1..MAX_SHARE_SUPPLY, d in 1..MAX_SHARE_SUPPLY,
		) {
			let p = price(a, b);
			let q = price(c, d);
			let forward = p.cmp(&q);
			prop_assert_eq!(forward.reverse(), q.cmp(&p));
			prop_assert_eq!(forward == Ordering::Equal,
				a as i128 * d as i128 == c as i128 * b as i128);
		}

		#[test]
		fn multiply_is_bounded_by_cross_products(
			amount in 0..MAX_SHARE_SUPPLY, base in 1..MAX_SHARE_SUPPLY, quote in 1..MAX_SHARE_SUPPLY,
		) {
			let p = price(base, quote);
			if let Ok(out) = Asset::new(amount, USD).multiply(&p) {
				let lhs = out.amount as i128 * base as i128;
				let rhs = amount as i128 * quote as i128;
				prop_assert!(lhs <= rhs);
				prop_assert!(lhs + base as i128 > rhs);
			}
		}
	}
}
