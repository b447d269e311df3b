//! TIFF reading and writing for images and label grids

mod tiff_io;

pub use tiff_io::{
    read_image, read_image_from_buffer, write_image, write_image_to_buffer, write_labels,
    write_labels_to_buffer,
};
