pub mod imagexpress;
pub mod metaseries;

pub use imagexpress::{parse_files, parse_multi_field_stacks, parse_single_plane_multi_fields};
pub use metaseries::load_metaseries_tiff;
