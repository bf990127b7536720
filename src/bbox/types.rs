use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Side length of the virtual grid that model coordinates are expressed on.
pub const GRID_SIZE: f64 = 1000.0;

/// A box on the 0–1000 virtual grid, in the model's `[ymin, xmin, ymax, xmax]`
/// order. Nothing here enforces `ymin <= ymax` or `xmin <= xmax`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub ymin: f64,
    pub xmin: f64,
    pub ymax: f64,
    pub xmax: f64,
}

impl NormalizedBox {
    pub fn new(ymin: f64, xmin: f64, ymax: f64, xmax: f64) -> Self {
        Self { ymin, xmin, ymax, xmax }
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.ymin, self.xmin, self.ymax, self.xmax]
    }

    /// Scale onto an image of `width` × `height` pixels.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let (w, h) = (width as f64, height as f64);
        PixelRect {
            xmin: self.xmin / GRID_SIZE * w,
            ymin: self.ymin / GRID_SIZE * h,
            xmax: self.xmax / GRID_SIZE * w,
            ymax: self.ymax / GRID_SIZE * h,
        }
    }
}

impl From<[f64; 4]> for NormalizedBox {
    fn from([ymin, xmin, ymax, xmax]: [f64; 4]) -> Self {
        Self::new(ymin, xmin, ymax, xmax)
    }
}

impl Serialize for NormalizedBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(4))?;
        for v in self.to_array() {
            // Integral values go back out as integers, the way the model sent them.
            if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                seq.serialize_element(&(v as i64))?;
            } else {
                seq.serialize_element(&v)?;
            }
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for NormalizedBox {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <[f64; 4]>::deserialize(deserializer).map(NormalizedBox::from)
    }
}

/// A box scaled to image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl PixelRect {
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// Insertion-ordered label → box mapping.
///
/// Re-inserting an existing label replaces its box but keeps the label at the
/// position where it was first inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelledBoxes {
    entries: Vec<(String, NormalizedBox)>,
    index: HashMap<String, usize>,
}

impl LabelledBoxes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update `label`, returning the box it previously held.
    pub fn insert(&mut self, label: impl Into<String>, bbox: NormalizedBox) -> Option<NormalizedBox> {
        let label = label.into();
        if let Some(&pos) = self.index.get(&label) {
            return Some(std::mem::replace(&mut self.entries[pos].1, bbox));
        }
        self.index.insert(label.clone(), self.entries.len());
        self.entries.push((label, bbox));
        None
    }

    pub fn get(&self, label: &str) -> Option<&NormalizedBox> {
        self.index.get(label).map(|&pos| &self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NormalizedBox)> {
        self.entries.iter().map(|(label, bbox)| (label.as_str(), bbox))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }
}

impl<S: Into<String>> FromIterator<(S, NormalizedBox)> for LabelledBoxes {
    fn from_iter<I: IntoIterator<Item = (S, NormalizedBox)>>(iter: I) -> Self {
        let mut boxes = Self::new();
        for (label, bbox) in iter {
            boxes.insert(label, bbox);
        }
        boxes
    }
}

impl Serialize for LabelledBoxes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (label, bbox) in self.iter() {
            map.serialize_entry(label, bbox)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelledBoxes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BoxesVisitor;

        impl<'de> Visitor<'de> for BoxesVisitor {
            type Value = LabelledBoxes;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of label to [ymin, xmin, ymax, xmax]")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut boxes = LabelledBoxes::new();
                while let Some((label, bbox)) = access.next_entry::<String, NormalizedBox>()? {
                    if label.is_empty() {
                        tracing::debug!("skipping box with empty label");
                        continue;
                    }
                    boxes.insert(label, bbox);
                }
                Ok(boxes)
            }
        }

        deserializer.deserialize_map(BoxesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_uses_width_for_x_and_height_for_y() {
        let px = NormalizedBox::new(500.0, 250.0, 750.0, 500.0).to_pixels(400, 800);
        assert_eq!(px.xmin, 100.0);
        assert_eq!(px.ymin, 400.0);
        assert_eq!(px.xmax, 200.0);
        assert_eq!(px.ymax, 600.0);
    }

    #[test]
    fn duplicate_label_updates_in_place() {
        let mut boxes = LabelledBoxes::new();
        boxes.insert("a", NormalizedBox::new(1.0, 1.0, 1.0, 1.0));
        boxes.insert("b", NormalizedBox::new(2.0, 2.0, 2.0, 2.0));
        let previous = boxes.insert("a", NormalizedBox::new(3.0, 3.0, 3.0, 3.0));

        assert_eq!(previous, Some(NormalizedBox::new(1.0, 1.0, 1.0, 1.0)));
        assert_eq!(boxes.labels().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(boxes.get("a").unwrap().ymin, 3.0);
        assert_eq!(boxes.len(), 2);
    }

    #[test]
    fn serialises_in_insertion_order_with_integral_values() {
        let boxes: LabelledBoxes = [
            ("zebra", NormalizedBox::new(1.0, 2.0, 3.0, 4.0)),
            ("apple", NormalizedBox::new(0.5, 0.0, 10.0, 20.0)),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&boxes).unwrap();
        assert_eq!(json, r#"{"zebra":[1,2,3,4],"apple":[0.5,0,10,20]}"#);
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(serde_json::from_str::<LabelledBoxes>(r#"{"a": [1, 2, 3]}"#).is_err());
        assert!(serde_json::from_str::<LabelledBoxes>(r#"{"a": [1, 2, 3, 4, 5]}"#).is_err());
        assert!(serde_json::from_str::<LabelledBoxes>(r#"[[1, 2, 3, 4]]"#).is_err());
    }
}
