//! Per-field enum tables used to render `EnumProperty` values.
//!
//! The decoder looks fields up by property name; a hit renders the numeric
//! value as `EnumName::Variant`. Callers may supply their own table; the
//! MK11 table below covers the database and texture fields.

/// A named enum with its numeric variants.
pub struct EnumDef {
    /// Enum type name used in the rendered form.
    pub name: &'static str,
    variants: &'static [(u64, &'static str)],
}

impl EnumDef {
    /// Looks up a variant name by value.
    pub fn variant(&self, value: u64) -> Option<&'static str> {
        self.variants
            .iter()
            .find(|&&(v, _)| v == value)
            .map(|&(_, n)| n)
    }
}

/// A field-name to enum mapping.
pub struct EnumTable {
    fields: &'static [(&'static str, &'static EnumDef)],
}

impl EnumTable {
    /// Builds a table over static field mappings.
    pub const fn new(fields: &'static [(&'static str, &'static EnumDef)]) -> Self {
        Self { fields }
    }

    /// An empty table; every enum renders numerically.
    pub const fn empty() -> Self {
        Self { fields: &[] }
    }

    /// Finds the enum for a property name.
    pub fn lookup(&self, field: &str) -> Option<&'static EnumDef> {
        self.fields
            .iter()
            .find(|&&(f, _)| f == field)
            .map(|&(_, def)| def)
    }
}

static UNLOCKABLE_TYPE: EnumDef = EnumDef {
    name: "MK11UnlockableType",
    variants: &[
        (0x0, "kUnlockNone"),
        (0x1, "kUnlockGeneral"),
        (0x2, "kUnlockBackground"),
        (0x3, "kUnlockCharacter"),
        (0x4, "kUnlockPlayerBadgeIcon"),
        (0x5, "kUnlockPlayerBadgeBgnd"),
        (0x6, "kUnlockModifier"),
        (0x7, "kUnlockAOC"),
        (0x8, "kUnlockInventoryItem"),
        (0x9, "kUnlockLoadoutSlot"),
        (0xA, "kUnlockInventorySpace"),
        (0xB, "kUnlockLootChest"),
        (0xC, "kUnlockEmoji"),
        (0xD, "kUnlockKollection"),
        (0xE, "kUnlockKrypt"),
        (0xF, "kUnlockAnnouncer"),
    ],
};

static ITEM_RARITY: EnumDef = EnumDef {
    name: "EItemRarityType",
    variants: &[
        (0x0, "NONE"),
        (0x1, "Rarity1"),
        (0x2, "Rarity2"),
        (0x3, "Rarity3"),
        (0x4, "Rarity4"),
        (0x5, "Max"),
        (0x6, "Normal"),
        (0x7, "Mortal"),
        (0x8, "Mythic"),
        (0x9, "Elder"),
    ],
};

static INVENTORY_ITEM_TYPE: EnumDef = EnumDef {
    name: "EInventoryItemType",
    variants: &[(0x0, "Instanced"), (0x1, "Stackable"), (0x2, "Unlockable")],
};

static ITEM_UNLOCKABLE_TYPE: EnumDef = EnumDef {
    name: "EItemUnlockableType",
    variants: &[
        (0x00, "NONE"),
        (0x01, "AIBattlesLootPool"),
        (0x02, "CharacterPortals"),
        (0x03, "CharacterTraining"),
        (0x04, "ErmacBodyLootTable"),
        (0x05, "Forge"),
        (0x06, "KenshiChestLootTable"),
        (0x07, "KollectorStore"),
        (0x08, "KombatLeague"),
        (0x09, "KronikaChestLootTable"),
        (0x0A, "Krypt"),
        (0x0B, "KryptNormalChests"),
        (0x0C, "NormalChestLootTable"),
        (0x0D, "PremierAndBossPortals"),
        (0x0E, "RAT"),
        (0x0F, "Story"),
        (0x10, "SandsOfTime"),
        (0x11, "TOTTutorial"),
        (0x12, "TowersRewards"),
        (0x13, "KryptLootTables_ErmacChests"),
        (0x14, "KryptLootTables_HeadSpikes"),
        (0x15, "KryptLootTables_KenshiChests"),
        (0x16, "KryptLootTables_KollectorStore"),
        (0x17, "KryptLootTables_KronikaChests"),
        (0x18, "KryptLootTables_NetherForge"),
        (0x19, "KryptLootTables_NormalChests"),
        (0x1A, "KryptLootTables_Restock1"),
        (0x1B, "KryptLootTables_Restock2"),
        (0x1C, "KryptLootTables_Restock3"),
        (0x1D, "KryptLootTables_ScorpionChests"),
        (0x1E, "KryptLootTables_ShaoKahnChests"),
        (0x1F, "KryptLootTables_Shrine"),
        (0x20, "KryptLootTables_ThroneRoom"),
        (0x21, "PortalHourly"),
        (0x22, "PortalAssist"),
        (0x23, "PortalDaily"),
        (0x24, "PortalKey"),
        (0x25, "PortalTeam"),
    ],
};

static ATTRIBUTE_PARAMETER_TYPE: EnumDef = EnumDef {
    name: "EAttributeParameterType",
    variants: &[
        (0x0, "String"),
        (0x1, "Int"),
        (0x2, "Float"),
        (0x3, "Percent"),
        (0x4, "Context_Character"),
        (0x5, "CharacterAttribute"),
    ],
};

static ATTRIBUTE_MODE_RESTRICTION: EnumDef = EnumDef {
    name: "EAttributeModeRestrictionType",
    variants: &[(0x0, "Any"), (0x1, "Multiverse"), (0x2, "AI"), (0x3, "Online")],
};

static KOLLECTION_CATEGORY: EnumDef = EnumDef {
    name: "EKollectionCategoryType",
    variants: &[
        (0x0, "NONE"),
        (0x1, "Characters"),
        (0x2, "Environments"),
        (0x3, "Story"),
        (0x4, "Endings"),
        (0x5, "Music"),
        (0x6, "FanArt"),
        (0x7, "Recipes"),
        (0x8, "Max"),
    ],
};

static INVENTORY_HIDE_GROUP: EnumDef = EnumDef {
    name: "EInventoryHideGroupType",
    variants: &[
        (0x00, "NONE"),
        (0x01, "Hidden"),
        (0x02, "HiddenGroup1"),
        (0x03, "HiddenGroup2"),
        (0x04, "HiddenGroup3"),
        (0x05, "HiddenGroup4"),
        (0x06, "HiddenGroup5"),
        (0x07, "HiddenGroup6"),
        (0x08, "HiddenGroup7"),
        (0x09, "HiddenGroup8"),
        (0x0A, "HiddenGroup9"),
        (0x0B, "HiddenGroup10"),
        (0x0C, "HiddenGroup11"),
        (0x0D, "HiddenGroup12"),
        (0x0E, "HiddenGroup13"),
        (0x0F, "HiddenGroup14"),
        (0x10, "HiddenGroup15"),
        (0x11, "HiddenGroup16"),
    ],
};

static ITEM_MOVE_INFO_BLOCK: EnumDef = EnumDef {
    name: "EItemMoveInfoBlockType",
    variants: &[
        (0x0, "NONE"),
        (0x1, "Low"),
        (0x2, "Med"),
        (0x3, "High"),
        (0x4, "Overhead"),
    ],
};

static TEXTURE_ADDRESS: EnumDef = EnumDef {
    name: "TextureAddress",
    variants: &[
        (0, "TA_Wrap"),
        (1, "TA_Clamp"),
        (2, "TA_Mirror"),
        (3, "TA_BlackBorder"),
        (4, "TA_MAX"),
    ],
};

static PIXEL_FORMAT: EnumDef = EnumDef {
    name: "EPixelFormat",
    variants: &[
        (0, "PF_Unknown"),
        (1, "PF_A32B32G32R32F"),
        (2, "PF_A8R8G8B8"),
        (3, "PF_G8"),
        (4, "PF_G16"),
        (5, "PF_DXT1"),
        (6, "PF_DXT3"),
        (7, "PF_DXT5"),
        (8, "PF_UYVY"),
        (9, "PF_FloatRGB"),
        (10, "PF_FloatRGBA"),
        (11, "PF_DepthStencil"),
        (12, "PF_ShadowDepth"),
        (13, "PF_FilteredShadowDepth"),
        (14, "PF_R32F"),
        (15, "PF_FloatRGBA_Full"),
        (16, "PF_R16G16_UNORM"),
        (17, "PF_R16G16_SNORM"),
        (18, "PF_R16G16_FLOAT"),
        (19, "PF_G32R32F"),
        (20, "PF_A2B10G10R10"),
        (21, "PF_BC6"),
        (22, "PF_BC7"),
        (23, "PF_A16B16G16R16"),
        (24, "PF_D24"),
        (25, "PF_R16F"),
        (26, "PF_R16_UNORM"),
        (27, "PF_BC5"),
        (28, "PF_V8U8"),
        (29, "PF_A1"),
        (30, "PF_FloatR11G11B10"),
        (31, "PF_X24S8"),
        (32, "PF_R8"),
        (33, "PF_R8_UInt"),
        (34, "PF_G8R8"),
        (35, "PF_R32G32B32A32"),
        (36, "PF_R8G8B8A8_Signed"),
        (37, "PF_S8"),
        (38, "PF_FloatR9G9B9E5"),
        (39, "PF_A8R8G8B8_SRGB"),
        (40, "PF_Depth16Stencil"),
        (41, "PF_R32_UInt"),
        (42, "PF_BC4"),
        (43, "PF_B4G4R4A4"),
        (44, "PF_R16_UInt"),
        (45, "PF_R16G16B16A16_UInt"),
        (46, "PF_R32G32_UInt"),
        (47, "PF_D32"),
        (48, "PF_FloatRGB_Full"),
        (49, "PF_R16G16_UInt"),
        (50, "PF_COUNT"),
    ],
};

static TEXTURE_QUALITY: EnumDef = EnumDef {
    name: "TextureQualitySettings",
    variants: &[
        (0, "TQ_QualityProduction"),
        (1, "TQ_QualityHighest"),
        (2, "TQ_QualityFastest"),
        (3, "TQ_Max"),
    ],
};

static TEXTURE_GROUP: EnumDef = EnumDef {
    name: "TextureGroup",
    variants: &[
        (0, "TEXTUREGROUP_World"),
        (1, "TEXTUREGROUP_WorldNormalMap"),
        (2, "TEXTUREGROUP_Character"),
        (3, "TEXTUREGROUP_CharacterCAP"),
        (4, "TEXTUREGROUP_CharacterNormalMap"),
        (5, "TEXTUREGROUP_CharacterCAPNormalMap"),
        (6, "TEXTUREGROUP_CharacterDetailSmall"),
        (7, "TEXTUREGROUP_CharacterDetailLarge"),
        (8, "TEXTUREGROUP_Weapon"),
        (9, "TEXTUREGROUP_WeaponNormalMap"),
        (10, "TEXTUREGROUP_Effects"),
        (11, "TEXTUREGROUP_Skybox"),
        (12, "TEXTUREGROUP_UI"),
        (13, "TEXTUREGROUP_LightAndShadowMap"),
        (14, "TEXTUREGROUP_RenderTarget"),
        (15, "TEXTUREGROUP_Floor"),
        (16, "TEXTUREGROUP_FullTesting"),
        (17, "TEXTUREGROUP_MobileFlattened"),
        (18, "TEXTUREGROUP_NoMips"),
        (19, "TEXTUREGROUP_System"),
        (20, "TEXTUREGROUP_MAX"),
    ],
};

/// The MK11 field-to-enum table.
pub static MK11: EnumTable = EnumTable::new(&[
    ("mUnlockType", &UNLOCKABLE_TYPE),
    ("mType", &UNLOCKABLE_TYPE),
    ("mRarity", &ITEM_RARITY),
    ("Rarity", &ITEM_RARITY),
    ("mCategory", &KOLLECTION_CATEGORY),
    ("InventoryItemType", &INVENTORY_ITEM_TYPE),
    ("UnlockableType", &ITEM_UNLOCKABLE_TYPE),
    ("Mode", &ATTRIBUTE_MODE_RESTRICTION),
    ("Type", &ATTRIBUTE_PARAMETER_TYPE),
    ("MoveInfoBlockType", &ITEM_MOVE_INFO_BLOCK),
    ("HideGroup", &INVENTORY_HIDE_GROUP),
    ("Format", &PIXEL_FORMAT),
    ("AddressX", &TEXTURE_ADDRESS),
    ("AddressY", &TEXTURE_ADDRESS),
    ("LODGroup", &TEXTURE_GROUP),
    ("TextureQuality", &TEXTURE_QUALITY),
]);
