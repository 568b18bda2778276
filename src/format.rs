use std::borrow::Borrow;

/// Scale a byte count to the largest binary unit below it.
pub fn format_bytes(bytes: u64) -> (f64, &'static str) {
    const KIB_F: f64 = 1024.0;
    const MIB_F: f64 = KIB_F * 1024.0;
    const GIB_F: f64 = MIB_F * 1024.0;
    const TIB_F: f64 = GIB_F * 1024.0;
    if bytes < 1024 { return (bytes as f64, "Bytes"); }
    let bytes_f = bytes as f64;
    if bytes_f < MIB_F { (bytes_f / KIB_F, "KiB") }
    else if bytes_f < GIB_F { (bytes_f / MIB_F, "MiB") }
    else if bytes_f < TIB_F { (bytes_f / GIB_F, "GiB") }
    else { (bytes_f / TIB_F, "TiB") }
}

pub fn human_size<B: Borrow<u64>>(bytes: B) -> String {
    let bytes = *bytes.borrow();
    if bytes < 1024 {
        return format!("{} Bytes", bytes);
    }
    let (value, unit) = format_bytes(bytes);
    format!("{:.2} {}", value, unit)
}

/// Like [`human_size`] but keeps the sign of offsets that resolved below zero.
pub fn human_signed(bytes: i64) -> String {
    if bytes < 0 {
        format!("-{}", human_size(bytes.unsigned_abs()))
    } else {
        human_size(bytes as u64)
    }
}
