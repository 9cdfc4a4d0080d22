/// Enum representing where the barcode of a fragment is stored.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresetBarcodeSource {
    /// `BARCODE_...` names, where the barcode is everything before the first underscore
    NamePrefix,

    /// `<READ_ID>_<BARCODE>_<COUNT>` names, as written by `umicollapse cluster`
    ConsensusSuffix,

    /// the barcode is the 7th column of the BED line
    Tag,
}

/// Returns a regular expression string for barcode presets, or `None` if the preset does not
/// read the barcode from the name column.
///
/// # Arguments
///
/// * `preset` - A reference to a `PresetBarcodeSource` enum variant.
///
/// # Returns
///
/// A `String` containing the regular expression for the specified barcode source. The first
/// capture group of the expression is the barcode.
pub fn get_barcode_regex(preset: &PresetBarcodeSource) -> Option<String> {
    match preset {
        PresetBarcodeSource::NamePrefix => Some(String::from(r"^([^_]+)")),
        PresetBarcodeSource::ConsensusSuffix => Some(String::from(r"_([A-Za-z]+)_[0-9]+$")),
        PresetBarcodeSource::Tag => None,
    }
}
