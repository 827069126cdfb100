// ===============================
// src/quant.rs (lot/tick rounding)
// ===============================
//
// Semua pembulatan qty/harga lewat representasi scaled-integer 1e-8
// (i128), bukan aritmetika float langsung. Alasannya: floor/round ke
// kelipatan step harus eksak, drift float tidak boleh menumpuk kalau
// sebuah nilai dibulatkan berulang kali.
//
// Konvensi:
// - Nilai masuk di-snap dulu ke grid 1e-8 (round-to-nearest), baru
//   operasi floor/round step dikerjakan di domain integer.
// - step <= 0 artinya "tidak ada step": hanya snap ke 8 desimal.

const SCALE: i128 = 100_000_000; // 1e8 -> presisi 8 desimal

fn to_units(x: f64) -> i128 {
    (x * SCALE as f64).round() as i128
}

fn from_units(u: i128) -> f64 {
    u as f64 / SCALE as f64
}

/// Snap nilai ke grid 8 desimal (menghilangkan noise representasi float).
pub fn dp8(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    from_units(to_units(value))
}

/// Floor ke kelipatan `step` terdekat di bawah (tidak pernah ke atas).
pub fn floor_to_step(value: f64, step: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let v = to_units(value);
    let s = to_units(step);
    if s <= 0 {
        return from_units(v);
    }
    from_units(v - v.rem_euclid(s))
}

/// Round ke kelipatan `step` terdekat (tick membatasi dua arah).
pub fn round_to_step(value: f64, step: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let v = to_units(value);
    let s = to_units(step);
    if s <= 0 {
        return from_units(v);
    }
    let rem = v.rem_euclid(s);
    let down = v - rem;
    if rem * 2 >= s {
        from_units(down + s)
    } else {
        from_units(down)
    }
}

/// Serialisasi angka untuk exchange: maksimal 8 digit desimal,
/// trailing zero dibuang ("0.00200000" -> "0.002", "100.00000000" -> "100").
pub fn fmt_amount(value: f64) -> String {
    let s = format!("{:.8}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_never_rounds_up() {
        assert_eq!(floor_to_step(100.0, 10.0), 100.0);
        assert_eq!(floor_to_step(109.99, 10.0), 100.0);
        assert_eq!(floor_to_step(0.0029, 0.001), 0.002);
    }

    #[test]
    fn floor_survives_float_noise() {
        // 0.1 + 0.2 == 0.30000000000000004 di f64; step-floor tetap 0.3
        assert_eq!(floor_to_step(0.1 + 0.2, 0.1), 0.3);
        assert_eq!(floor_to_step(0.3, 0.1), 0.3);
    }

    #[test]
    fn round_goes_both_directions() {
        assert_eq!(round_to_step(100.26, 0.5), 100.5);
        assert_eq!(round_to_step(100.24, 0.5), 100.0);
        assert_eq!(round_to_step(50000.07, 0.1), 50000.1);
    }

    #[test]
    fn zero_step_only_snaps_to_dp8() {
        assert_eq!(floor_to_step(1.23456789, 0.0), 1.23456789);
        assert_eq!(round_to_step(1.23456789, 0.0), 1.23456789);
        assert_eq!(dp8(0.1 + 0.2), 0.3);
    }

    #[test]
    fn fmt_amount_trims() {
        assert_eq!(fmt_amount(0.002), "0.002");
        assert_eq!(fmt_amount(100.0), "100");
        assert_eq!(fmt_amount(0.0), "0");
        assert_eq!(fmt_amount(0.00000001), "0.00000001");
    }
}
