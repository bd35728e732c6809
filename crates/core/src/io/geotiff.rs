//! GeoTIFF reading and writing on top of the `tiff` crate.
//!
//! Georeferencing is carried in the standard GeoTIFF tags
//! (ModelPixelScale, ModelTiepoint, GeoKeyDirectory) plus the GDAL no-data
//! tag, which is enough for GDAL and QGIS to place the output correctly.
//!
//! Multi-band inputs are stored one band per page. Pages flagged as
//! reduced-resolution (`NewSubfileType` bit 0) are overviews and are
//! skipped on read.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::io::overview::build_overviews;
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::GrayI32;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;
const GEO_KEY_DIRECTORY_TAG: u16 = 34735;
const GDAL_NODATA_TAG: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Number of mode-resampled overview pages (factors 2, 4, 8, ...)
    pub overview_levels: u32,
}

/// Decoder without size limits; annual stacks of a whole region exceed the defaults
fn open_decoder<R: Read + Seek>(reader: R) -> Result<Decoder<R>> {
    Ok(Decoder::new(reader)?.with_limits(Limits::unlimited()))
}

/// Read the first full-resolution band of a GeoTIFF file
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = BufReader::new(File::open(path.as_ref())?);
    let mut decoder = open_decoder(file)?;
    decode_page(&mut decoder)
}

/// Read the first band of a GeoTIFF held in memory
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    let mut decoder = open_decoder(Cursor::new(data))?;
    decode_page(&mut decoder)
}

/// Read every full-resolution page of a multi-page GeoTIFF as a band.
///
/// Band order is page order. Pages without their own georeferencing
/// inherit the first page's transform and CRS.
pub fn read_band_stack<P: AsRef<Path>>(path: P) -> Result<Vec<Raster<i32>>> {
    let file = BufReader::new(File::open(path.as_ref())?);
    // continental stacks exceed the default decoding buffer limit
    let mut decoder = open_decoder(file)?;
    let mut bands: Vec<Raster<i32>> = Vec::new();

    loop {
        if !is_overview_page(&mut decoder) {
            let georef = read_georef(&mut decoder);
            let mut band: Raster<i32> = decode_page(&mut decoder)?;
            if let Some(first) = bands.first() {
                if georef.transform.is_none() {
                    band.set_transform(*first.transform());
                }
                if georef.crs.is_none() {
                    band.set_crs(first.crs().copied());
                }
            }
            bands.push(band);
        }
        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    if bands.is_empty() {
        return Err(Error::InvalidDimensions { width: 0, height: 0 });
    }
    Ok(bands)
}

/// Write a coded (categorical) raster, with overviews when requested
pub fn write_geotiff<P: AsRef<Path>>(
    raster: &Raster<i32>,
    path: P,
    options: &GeoTiffOptions,
) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    encode_geotiff(raster, file, options)
}

/// Same as [`write_geotiff`] but into a byte buffer
pub fn write_geotiff_to_buffer(raster: &Raster<i32>, options: &GeoTiffOptions) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options)?;
    Ok(buf)
}

/// Write bands as consecutive pages of one GeoTIFF
pub fn write_band_stack<P: AsRef<Path>>(bands: &[Raster<i32>], path: P) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder = TiffEncoder::new(file)?;
    for band in bands {
        encode_page(&mut encoder, band, false)?;
    }
    Ok(())
}

fn encode_geotiff<W: Write + Seek>(
    raster: &Raster<i32>,
    writer: W,
    options: &GeoTiffOptions,
) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    encode_page(&mut encoder, raster, false)?;
    for overview in build_overviews(raster, options.overview_levels)? {
        encode_page(&mut encoder, &overview, true)?;
    }
    Ok(())
}

fn encode_page<W: Write + Seek>(
    encoder: &mut TiffEncoder<W>,
    raster: &Raster<i32>,
    reduced: bool,
) -> Result<()> {
    let (rows, cols) = raster.shape();
    let data: Vec<i32> = raster.data().iter().copied().collect();
    let gt = raster.transform();

    let mut image = encoder.new_image::<GrayI32>(cols as u32, rows as u32)?;
    if reduced {
        image.encoder().write_tag(Tag::NewSubfileType, 1u32)?;
    }

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE_TAG), &scale[..])?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT_TAG), &tiepoint[..])?;

    let geokeys = geokeys_for(raster.crs());
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY_TAG), geokeys.as_slice())?;

    if let Some(nd) = raster.nodata() {
        let text = nd.to_string();
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA_TAG), text.as_str())?;
    }

    image.write_data(&data)?;
    Ok(())
}

/// GeoKey directory recording the CRS.
///
/// Geographic systems go in GeographicTypeGeoKey, everything else in
/// ProjectedCSTypeGeoKey. Without a CRS only the model and raster type keys
/// are written.
fn geokeys_for(crs: Option<&CRS>) -> Vec<u16> {
    let code = crs.and_then(|c| u16::try_from(c.epsg()).ok().map(|code| (c, code)));
    match code {
        Some((crs, code)) if crs.is_geographic() => vec![
            1, 1, 0, 3,
            GT_MODEL_TYPE_KEY, 0, 1, 2,
            GT_RASTER_TYPE_KEY, 0, 1, 1,
            GEOGRAPHIC_TYPE_KEY, 0, 1, code,
        ],
        Some((_, code)) => vec![
            1, 1, 0, 3,
            GT_MODEL_TYPE_KEY, 0, 1, 1,
            GT_RASTER_TYPE_KEY, 0, 1, 1,
            PROJECTED_CS_TYPE_KEY, 0, 1, code,
        ],
        None => vec![
            1, 1, 0, 2,
            GT_MODEL_TYPE_KEY, 0, 1, 1,
            GT_RASTER_TYPE_KEY, 0, 1, 1,
        ],
    }
}

fn crs_from_geokeys(keys: &[u16]) -> Option<CRS> {
    let count = *keys.get(3)? as usize;
    keys.chunks_exact(4)
        .skip(1)
        .take(count)
        .find(|entry| {
            (entry[0] == GEOGRAPHIC_TYPE_KEY || entry[0] == PROJECTED_CS_TYPE_KEY)
                && entry[1] == 0
                && entry[3] != USER_DEFINED
        })
        .map(|entry| CRS::from_epsg(entry[3] as u32))
}

struct Georef {
    transform: Option<GeoTransform>,
    crs: Option<CRS>,
    nodata: Option<f64>,
}

fn read_georef<R: Read + Seek>(decoder: &mut Decoder<R>) -> Georef {
    let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE_TAG));
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT_TAG));

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let transform = match (scale, tiepoint) {
        (Ok(s), Ok(t)) if s.len() >= 2 && t.len() >= 6 => Some(GeoTransform::new(
            t[3] - t[0] * s[0],
            t[4] + t[1] * s[1],
            s[0],
            -s[1],
        )),
        _ => None,
    };

    let crs = decoder
        .get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY_TAG))
        .ok()
        .and_then(|keys| crs_from_geokeys(&keys));

    let nodata = decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA_TAG))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

    Georef {
        transform,
        crs,
        nodata,
    }
}

fn is_overview_page<R: Read + Seek>(decoder: &mut Decoder<R>) -> bool {
    decoder
        .get_tag_u32(Tag::NewSubfileType)
        .map(|v| v & 1 == 1)
        .unwrap_or(false)
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

/// Decode the decoder's current page
fn decode_page<T, R>(decoder: &mut Decoder<R>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;
    let georef = read_georef(decoder);

    let data: Vec<T> = match decoder.read_image()? {
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::U64(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::I64(buf) => cast_all(buf),
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    // multi-sample pages decode to more values than pixels
    if data.len() != rows * cols {
        return Err(Error::UnsupportedDataType(format!(
            "expected one sample per pixel, got {} values for {}x{}",
            data.len(),
            cols,
            rows
        )));
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = georef.transform {
        raster.set_transform(transform);
    }
    raster.set_crs(georef.crs);
    raster.set_nodata(georef.nodata.and_then(num_traits::cast));
    Ok(raster)
}
