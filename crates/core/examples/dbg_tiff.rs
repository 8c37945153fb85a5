use std::fs::File;
use tiff::decoder::Decoder;
use tiff::tags::Tag;

fn main() {
    let dir = std::env::temp_dir().join("dbg_tiff_out");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("x.tif");

    use calura_core::raster::{GeoTransform, Raster};
    use calura_core::crs::Crs;
    let values = vec![20.5f64,21.0,21.5, 22.0,f64::NAN,23.0, 23.5,24.0,24.5];
    let mut r = Raster::from_vec(values, 3, 3).unwrap();
    r.set_transform(GeoTransform::new(680_000.0, 4_930_000.0, 30.0, -30.0));
    r.set_crs(Some(Crs::utm(32, true)));
    calura_core::io::write_geotiff(&r, &path).unwrap();

    let file = File::open(&path).unwrap();
    let mut d = Decoder::new(file).unwrap();
    // Try reading tags BEFORE read_image
    println!("pixel_scale before: {:?}", d.get_tag_f64_vec(Tag::Unknown(33550)));
    println!("tiepoint before: {:?}", d.get_tag_f64_vec(Tag::Unknown(33922)));
    println!("geokey before: {:?}", d.get_tag_u32_vec(Tag::Unknown(34735)));
    println!("nodata before: {:?}", d.get_tag_ascii_string(Tag::Unknown(42113)));
    let _ = d.read_image().unwrap();
    println!("--- after read_image ---");
    println!("pixel_scale after: {:?}", d.get_tag_f64_vec(Tag::Unknown(33550)));
    println!("nodata after: {:?}", d.get_tag_ascii_string(Tag::Unknown(42113)));
}
