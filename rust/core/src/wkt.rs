// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fence WKT parser using nom
//!
//! Accepts `POLYGON` and `MULTIPOLYGON` (with optional `Z`/`M`/`ZM`
//! dimension markers, extra ordinates are dropped) and an optional EWKT
//! `SRID=<n>;` prefix.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::{many0, separated_list1},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::error::{Error, Result};
use crate::model::Srid;

/// A parsed fence polygon and the SRID it declared, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct FenceGeometry {
    pub srid: Option<Srid>,
    pub geometry: MultiPolygon<f64>,
}

/// Parse a fence WKT/EWKT string.
pub fn parse_fence(input: &str) -> Result<FenceGeometry> {
    let parsed = all_consuming(delimited(
        multispace0,
        pair(opt(srid_prefix), geometry),
        multispace0,
    ))(input);

    match parsed {
        Ok((_, (srid, mut geometry))) => {
            geometry.0.retain(|p| !p.exterior().0.is_empty());
            if geometry.0.is_empty() {
                return Err(Error::InvalidWkt("fence polygon is empty".to_string()));
            }
            Ok(FenceGeometry { srid, geometry })
        }
        Err(e) => Err(Error::InvalidWkt(format!("{}", e))),
    }
}

/// `SRID=25832;`
fn srid_prefix(input: &str) -> IResult<&str, Srid> {
    map(
        terminated(
            preceded(
                tag_no_case("SRID="),
                map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
                    s.parse::<i32>()
                }),
            ),
            preceded(multispace0, char(';')),
        ),
        Srid,
    )(input)
}

fn geometry(input: &str) -> IResult<&str, MultiPolygon<f64>> {
    alt((multipolygon, map(polygon, |p| MultiPolygon(vec![p]))))(input)
}

/// Optional `Z`, `M` or `ZM` marker after the geometry keyword.
fn dimension(input: &str) -> IResult<&str, ()> {
    map(
        opt(preceded(
            multispace1,
            alt((tag_no_case("ZM"), tag_no_case("Z"), tag_no_case("M"))),
        )),
        |_| (),
    )(input)
}

fn polygon(input: &str) -> IResult<&str, Polygon<f64>> {
    preceded(
        tuple((tag_no_case("POLYGON"), dimension, multispace0)),
        alt((polygon_body, map(tag_no_case("EMPTY"), |_| empty_polygon()))),
    )(input)
}

fn multipolygon(input: &str) -> IResult<&str, MultiPolygon<f64>> {
    preceded(
        tuple((tag_no_case("MULTIPOLYGON"), dimension, multispace0)),
        alt((
            map(
                delimited(
                    char('('),
                    separated_list1(comma, preceded(multispace0, polygon_body)),
                    preceded(multispace0, char(')')),
                ),
                MultiPolygon,
            ),
            map(tag_no_case("EMPTY"), |_| MultiPolygon(Vec::new())),
        )),
    )(input)
}

/// `((x y, ...), (x y, ...))`: exterior ring then holes.
fn polygon_body(input: &str) -> IResult<&str, Polygon<f64>> {
    map(
        delimited(
            char('('),
            separated_list1(comma, preceded(multispace0, ring)),
            preceded(multispace0, char(')')),
        ),
        |mut rings| {
            let exterior = rings.remove(0);
            Polygon::new(exterior, rings)
        },
    )(input)
}

fn ring(input: &str) -> IResult<&str, LineString<f64>> {
    map(
        delimited(
            char('('),
            separated_list1(comma, preceded(multispace0, coordinate)),
            preceded(multispace0, char(')')),
        ),
        LineString::new,
    )(input)
}

/// `x y [z [m]]`
fn coordinate(input: &str) -> IResult<&str, Coord<f64>> {
    map(
        tuple((
            double,
            preceded(multispace1, double),
            many0(preceded(multispace1, double)),
        )),
        |(x, y, _)| Coord { x, y },
    )(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    preceded(multispace0, char(','))(input)
}

fn empty_polygon() -> Polygon<f64> {
    Polygon::new(LineString::new(Vec::new()), Vec::new())
}
