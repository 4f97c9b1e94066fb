//! DWARF CFI (`.eh_frame`) and Itanium LSDA (`.gcc_except_table`) encoding
//! for the ELF backend (spec §4.8). COFF's equivalent unwind data
//! (pdata/xdata) lives in [`crate::module`] since it is driven directly by
//! the frame layout rather than by a shared byte-level encoder.

pub mod cfi;
pub mod lsda;
