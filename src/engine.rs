//! Price derivation. Pure: no clocks, no channels, no shared state, so the
//! formula can be swapped or property-tested on its own.

/// Tuning knobs for the price formula.
#[derive(Debug, Clone, Copy)]
pub struct PriceParams {
    pub volatility: f64,
    pub floor_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceUpdate {
    pub price: f64,
    pub change_percent: f64,
}

/// Compute the next price from the current price and one window of votes.
///
/// An empty window leaves the price unchanged. Otherwise the sentiment ratio
/// `(up - down) / (up + down)` is scaled by the volatility factor and applied
/// multiplicatively, clamped at the floor.
pub fn next_price(params: &PriceParams, current: f64, up_count: u64, down_count: u64) -> PriceUpdate {
    let total = up_count + down_count;
    if total == 0 {
        return PriceUpdate {
            price: current,
            change_percent: 0.0,
        };
    }

    let net = up_count as f64 - down_count as f64;
    let ratio = net / total as f64;
    let delta = ratio * params.volatility;
    let price = (current * (1.0 + delta)).max(params.floor_price);

    let change_percent = if current == 0.0 {
        0.0
    } else {
        (price - current) / current * 100.0
    };

    PriceUpdate {
        price,
        change_percent,
    }
}
