//! CD-ROM error detection (EDC) and Reed-Solomon error correction (ECC) codes.
//!
//! The EDC is a 32bit CRC using the polynomial `(x^16 + x^15 + x^2 + 1) * (x^16 + x^2 + x + 1)`
//! processed LSB first, with no initial value and no final XOR.
//!
//! The ECC is a product code over GF(2^8) (primitive polynomial `x^8 + x^4 + x^3 + x^2 + 1`). The
//! 2064 bytes from the header to the end of the intermediate field are seen as two interleaved
//! planes (even and odd bytes) of 43 columns by 24 rows. The "P" parity adds two rows computed
//! over every column (RS(26, 24)), then the "Q" parity adds two more words computed over the 26
//! diagonals of the resulting 43x26 matrix (RS(45, 43)).
//!
//! See ECMA-130 Annex A for the full description.
//!
//! All the tables are generated at compile time.

use crate::sector::XaForm;

/// Size of a full raw sector
const RAW_SIZE: usize = 2352;

/// Offset of the 4 byte header (following the sync pattern)
const HEADER_OFFSET: usize = 12;

/// Number of bytes covered by the P parity (header up to the ECC-P field)
pub const ECC_P_DATA_SIZE: usize = 2064;
/// Size of the P parity field
pub const ECC_P_SIZE: usize = 172;
/// Number of bytes covered by the Q parity (header up to the ECC-Q field)
pub const ECC_Q_DATA_SIZE: usize = ECC_P_DATA_SIZE + ECC_P_SIZE;
/// Size of the Q parity field
pub const ECC_Q_SIZE: usize = 104;

/// Offset of the P parity in a raw sector
const ECC_P_OFFSET: usize = HEADER_OFFSET + ECC_P_DATA_SIZE;
/// Offset of the Q parity in a raw sector
const ECC_Q_OFFSET: usize = ECC_P_OFFSET + ECC_P_SIZE;

/// Mode 2 Form 1: EDC covers the sub-header and user data
const FORM1_EDC_START: usize = 16;
const FORM1_EDC_OFFSET: usize = 2072;
/// Mode 2 Form 2: EDC covers the sub-header and user data, no ECC
const FORM2_EDC_OFFSET: usize = 2348;

const EDC_POLY: u32 = 0x8001_801b;
const GF8_PRIM_POLY: u16 = 0x11d;

/// Reverse the `bits` low bits of `d`
const fn mirror_bits(mut d: u32, bits: u32) -> u32 {
    let mut r = 0;
    let mut i = 0;

    while i < bits {
        r = (r << 1) | (d & 1);
        d >>= 1;
        i += 1;
    }

    r
}

/// Byte-at-a-time lookup table for the EDC
pub const EDC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut r = mirror_bits(i as u32, 8) << 24;
        let mut b = 0;

        while b < 8 {
            r = if r & 0x8000_0000 != 0 {
                (r << 1) ^ EDC_POLY
            } else {
                r << 1
            };
            b += 1;
        }

        table[i] = mirror_bits(r, 32);
        i += 1;
    }

    table
};

/// GF(2^8) log table. `GF_LOG[0]` is meaningless and must never be used.
pub const GF_LOG: [u8; 256] = GF_TABLES.0;
/// GF(2^8) antilog (exponent) table: `GF_ALOG[GF_LOG[x]] == x` for any non-zero `x`
pub const GF_ALOG: [u8; 256] = GF_TABLES.1;

const GF_TABLES: ([u8; 256], [u8; 256]) = {
    let mut log = [0u8; 256];
    let mut alog = [0u8; 256];
    let mut b: u16 = 1;
    let mut i = 0;

    while i < 255 {
        log[b as usize] = i as u8;
        alog[i] = b as u8;

        b <<= 1;
        if b & 0x100 != 0 {
            b ^= GF8_PRIM_POLY;
        }

        i += 1;
    }

    (log, alog)
};

#[cfg(test)]
const fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }

    let sum = GF_LOG[a as usize] as usize + GF_LOG[b as usize] as usize;

    GF_ALOG[sum % 255]
}

const fn gf_div(a: u8, b: u8) -> u8 {
    if a == 0 {
        return 0;
    }

    // b is never 0 for the coefficient derivation below
    let diff = GF_LOG[a as usize] as usize + 255 - GF_LOG[b as usize] as usize;

    GF_ALOG[diff % 255]
}

/// Logarithms of the RS(45, 43) generator coefficients used for the Q parity. Row 0 produces the
/// first parity word (stored first in the parity field), row 1 the second one.
///
/// They're derived by solving the parity check matrix:
///
/// ```text
///  1    1    ...  1   1
///  a^44 a^43 ...  a^1 a^0
/// ```
///
/// for the last two positions of the codeword.
pub const DQ: [[u8; 43]; 2] = {
    let a1 = GF_ALOG[1];
    let mut dq = [[0u8; 43]; 2];

    // Coefficients for codeword position 43 and 44 respectively, normalized so that the
    // coefficient applied to the parity word itself is 1.
    let norm43 = a1 ^ 1;
    let norm44 = 1 ^ gf_div(1, a1);

    let mut j = 0;
    while j < 43 {
        let e1 = GF_ALOG[44 - j];

        let c43 = gf_div(e1 ^ 1, norm43);
        let c44 = gf_div(1 ^ gf_div(e1, a1), norm44);

        dq[0][j] = GF_LOG[c43 as usize];
        dq[1][j] = GF_LOG[c44 as usize];

        j += 1;
    }

    dq
};

/// Logarithms of the RS(26, 24) coefficients used for the P parity. The P code is the Q code
/// shortened to its last 26 positions.
pub const DP: [[u8; 24]; 2] = {
    let mut dp = [[0u8; 24]; 2];
    let mut i = 0;

    while i < 24 {
        dp[0][i] = DQ[0][i + 19];
        dp[1][i] = DQ[1][i + 19];
        i += 1;
    }

    dp
};

/// Compute the EDC over `data`.
pub fn edc(data: &[u8]) -> u32 {
    data.iter().fold(0, |crc, &b| {
        EDC_TABLE[((crc ^ u32::from(b)) & 0xff) as usize] ^ (crc >> 8)
    })
}

/// Compute the EDC over `data[start..end]`
pub fn compute_edc(data: &[u8], start: usize, end: usize) -> u32 {
    edc(&data[start..end])
}

/// XOR the product of two field elements, given by their logarithms, into `acc`. Zero bytes have
/// no logarithm so the callers skip them.
#[inline]
fn accumulate(acc: &mut u8, base_log: u8, coef_log: u8) {
    let sum = (base_log as usize + coef_log as usize) % 255;

    *acc ^= GF_ALOG[sum];
}

/// Compute the P parity of `data`, which must contain the 2064 bytes starting at the sector
/// header (offset 12 of a raw sector).
pub fn ecc_p(data: &[u8; ECC_P_DATA_SIZE], out: &mut [u8; ECC_P_SIZE]) {
    out.fill(0);

    // 43 columns, 2 byte planes
    for col in 0..(2 * 43) {
        let mut p0 = 0;
        let mut p1 = 0;

        for row in 0..24 {
            let d = data[row * 2 * 43 + col];

            if d != 0 {
                let base = GF_LOG[d as usize];

                accumulate(&mut p0, base, DP[0][row]);
                accumulate(&mut p1, base, DP[1][row]);
            }
        }

        out[col] = p0;
        out[2 * 43 + col] = p1;
    }
}

/// Compute the Q parity of `data`, which must contain the 2236 bytes starting at the sector
/// header, P parity included.
pub fn ecc_q(data: &[u8; ECC_Q_DATA_SIZE], out: &mut [u8; ECC_Q_SIZE]) {
    out.fill(0);

    // 26 diagonals, 2 byte planes
    for diag in 0..26 {
        for plane in 0..2 {
            let mut q0 = 0;
            let mut q1 = 0;
            let mut pos = diag * 2 * 43;

            for k in 0..43 {
                let d = data[pos + plane];

                if d != 0 {
                    let base = GF_LOG[d as usize];

                    accumulate(&mut q0, base, DQ[0][k]);
                    accumulate(&mut q1, base, DQ[1][k]);
                }

                pos += 2 * 44;
                if pos >= ECC_Q_DATA_SIZE {
                    pos -= ECC_Q_DATA_SIZE;
                }
            }

            out[diag * 2 + plane] = q0;
            out[2 * 26 + diag * 2 + plane] = q1;
        }
    }
}

/// Compute the P and Q parity fields of a raw 2352 byte sector in place. The header is used as
/// found in `raw`.
fn write_ecc(raw: &mut [u8; RAW_SIZE]) {
    {
        let (data, parity) = raw.split_at_mut(ECC_P_OFFSET);

        ecc_p(
            array_ref![data, HEADER_OFFSET, ECC_P_DATA_SIZE],
            array_mut_ref![parity, 0, ECC_P_SIZE],
        );
    }

    let (data, parity) = raw.split_at_mut(ECC_Q_OFFSET);

    ecc_q(
        array_ref![data, HEADER_OFFSET, ECC_Q_DATA_SIZE],
        array_mut_ref![parity, 0, ECC_Q_SIZE],
    );
}

/// Regenerate the EDC and (for Form 1) the ECC of a raw Mode 2 XA sector after its sub-header or
/// user data changed.
///
/// Mode 2 parity doesn't cover the sector address: the 4 header bytes are taken as zero while
/// computing the ECC and restored afterwards. The EDC must be written first since it's covered by
/// the ECC.
pub fn rebuild_parity(raw: &mut [u8; RAW_SIZE], form: XaForm) {
    match form {
        XaForm::Form1 => {
            let crc = compute_edc(raw, FORM1_EDC_START, FORM1_EDC_OFFSET);
            raw[FORM1_EDC_OFFSET..FORM1_EDC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());

            let header = *array_ref![raw, HEADER_OFFSET, 4];
            raw[HEADER_OFFSET..HEADER_OFFSET + 4].fill(0);

            write_ecc(raw);

            raw[HEADER_OFFSET..HEADER_OFFSET + 4].copy_from_slice(&header);
        }
        XaForm::Form2 => {
            let crc = compute_edc(raw, FORM1_EDC_START, FORM2_EDC_OFFSET);
            raw[FORM2_EDC_OFFSET..FORM2_EDC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
        }
    }
}

/// Recompute the EDC of a Mode 1 sector (sync, header and user data) and compare it with the
/// stored value.
pub fn mode1_edc_matches(raw: &[u8; RAW_SIZE]) -> bool {
    let stored = u32::from_le_bytes(*array_ref![raw, 2064, 4]);

    compute_edc(raw, 0, 2064) == stored
}

/// Recompute the EDC of a Mode 2 XA sector and compare it with the stored value
pub fn mode2_edc_matches(raw: &[u8; RAW_SIZE], form: XaForm) -> bool {
    let end = match form {
        XaForm::Form1 => FORM1_EDC_OFFSET,
        XaForm::Form2 => FORM2_EDC_OFFSET,
    };

    let stored = u32::from_le_bytes(*array_ref![raw, end, 4]);

    compute_edc(raw, FORM1_EDC_START, end) == stored
}
