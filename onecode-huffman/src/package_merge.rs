//! Length-limited code length assignment via package-merge (coin-collector).
//!
//! Given a set of weighted symbols and a maximum code length, this finds
//! the optimal set of code lengths subject to that bound, following
//! Larmore & Hirschberg's package-merge construction: build `max_len`
//! levels where each level packages adjacent pairs of the previous level
//! and merges the result back in with the original items, then read code
//! lengths off the number of times each symbol appears among the
//! `2*(n-1)` lightest items of the final level.

#[derive(Clone)]
struct Item {
    weight: u64,
    members: Vec<usize>,
}

/// Compute a code length per input weight, indices matching `weights`.
///
/// `weights` must contain only symbols with weight > 0 (the caller is
/// responsible for excluding zero-count symbols, optionally folding in a
/// synthetic escape item first).
pub fn build_lengths(weights: &[u64], max_len: u8) -> Vec<u8> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1];
    }

    let mut base: Vec<Item> = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| Item {
            weight: w,
            members: vec![i],
        })
        .collect();
    base.sort_by_key(|it| it.weight);

    let mut current = base.clone();
    for _level in 2..=max_len {
        let mut packaged = Vec::with_capacity(current.len() / 2);
        let mut i = 0;
        while i + 1 < current.len() {
            let mut members = current[i].members.clone();
            members.extend_from_slice(&current[i + 1].members);
            packaged.push(Item {
                weight: current[i].weight + current[i + 1].weight,
                members,
            });
            i += 2;
        }
        let mut merged = Vec::with_capacity(packaged.len() + base.len());
        merged.extend(packaged);
        merged.extend(base.iter().cloned());
        merged.sort_by_key(|it| it.weight);
        current = merged;
    }

    let take = (2 * (n - 1)).min(current.len());
    let mut lengths = vec![0u8; n];
    for item in current.iter().take(take) {
        for &idx in &item.members {
            lengths[idx] += 1;
        }
    }
    lengths
}

/// Assign canonical code values for a set of (non-zero) code lengths,
/// shortest-length-first, ties broken by input order. Returns one code
/// value per input length (right-aligned in a `u16`, `length` bits wide).
pub fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut order: Vec<usize> = (0..lengths.len()).filter(|&i| lengths[i] > 0).collect();
    order.sort_by_key(|&i| (lengths[i], i));

    let mut codes = vec![0u16; lengths.len()];
    let mut code: u32 = 0;
    let mut prev_len = 0u8;
    for &i in &order {
        let len = lengths[i];
        code <<= len - prev_len;
        codes[i] = code as u16;
        code += 1;
        prev_len = len;
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kraft_ok(lengths: &[u8]) -> bool {
        let sum: f64 = lengths.iter().filter(|&&l| l > 0).map(|&l| 2f64.powi(-(l as i32))).sum();
        sum <= 1.0 + 1e-9
    }

    #[test]
    fn single_symbol_gets_length_one() {
        assert_eq!(build_lengths(&[42], 12), vec![1]);
    }

    #[test]
    fn satisfies_kraft_inequality() {
        let weights = vec![60u64, 30, 10];
        let lengths = build_lengths(&weights, 12);
        assert!(kraft_ok(&lengths));
        assert!(lengths.iter().all(|&l| l > 0 && l <= 12));
    }

    #[test]
    fn respects_max_length_with_skewed_weights() {
        // Highly skewed weights would otherwise want codes longer than 12 bits.
        let weights: Vec<u64> = (0..40).map(|i| 1u64 << i.min(30)).collect();
        let lengths = build_lengths(&weights, 12);
        assert!(lengths.iter().all(|&l| l <= 12));
        assert!(kraft_ok(&lengths));
    }

    #[test]
    fn canonical_codes_are_prefix_free() {
        let lengths = vec![2u8, 1, 3, 3, 0, 2];
        let codes = canonical_codes(&lengths);
        let mut seen: Vec<(u8, u16)> = Vec::new();
        for (i, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            seen.push((len, codes[i]));
        }
        for i in 0..seen.len() {
            for j in 0..seen.len() {
                if i == j {
                    continue;
                }
                let (li, ci) = seen[i];
                let (lj, cj) = seen[j];
                if li <= lj {
                    // ci must not be a prefix of cj
                    let shifted = cj >> (lj - li);
                    assert_ne!(ci, shifted, "code {i} is a prefix of code {j}");
                }
            }
        }
    }
}
